//! Conversion pipeline and batch orchestration.
//!
//! One file goes through parse, template merge, assembly, matchup, a first
//! write and a second statistics pass, strictly in that order. Files in a
//! batch are independent: each gets its own store and its own output file,
//! and a failure in one is recorded without stopping the others.
//!
//! ## Architecture
//!
//! - [`discovery`] - Input path expansion and pattern matching
//! - [`writer`] - Dataset writer trait and its Parquet implementation
//! - [`statistics`] - Second-pass bounds over written data

pub mod discovery;
pub mod statistics;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::statistics::StatisticsFinalizer;
use self::writer::{DatasetWriter, ParquetTrajectoryWriter, WriteReport, WriterOptions};

use crate::config::ConversionConfig;
use crate::constants::{OUTPUT_EXTENSION, STAGING_EXTENSION};
use crate::error::{Result, TagError};
use crate::models::{BatchReport, ConversionSummary, FailedFile};
use crate::parser::TagFileParser;
use crate::profile::{MetadataProfile, Template, validate_attribute_types};
use crate::trajectory::{TrajectoryAssembler, TrajectoryDataset, bin_attributes};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Converts one tag log into one trajectory file
#[derive(Debug, Clone)]
pub struct TrajectoryConverter {
    config: ConversionConfig,
    profile: Arc<MetadataProfile>,
    template: Option<Arc<Template>>,
    parser: TagFileParser,
}

impl TrajectoryConverter {
    pub fn new(config: ConversionConfig, profile: Arc<MetadataProfile>) -> Self {
        Self {
            parser: TagFileParser::new(profile.clone()),
            config,
            profile,
            template: None,
        }
    }

    pub fn with_template(mut self, template: Arc<Template>) -> Self {
        self.template = Some(template);
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// `<dir>/<stem>.parquet`, with a trailing `.gz` ignored when picking the stem
    pub fn output_path_for(&self, input: &Path, output_dir: &Path) -> PathBuf {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "trajectory".to_string());
        output_dir.join(format!("{}.{}", stem, OUTPUT_EXTENSION))
    }

    /// Run the full pipeline for one file
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<ConversionSummary> {
        self.convert_guarded(input, output, &ConversionGuard::new())
    }

    /// Run the full pipeline, publishing `output` only if `guard` was not abandoned
    ///
    /// Both write passes go to a hidden sibling of `output`, which is renamed
    /// into place once statistics are final. On any failure the staged file is
    /// removed, so `output` only ever holds a finished trajectory.
    pub fn convert_guarded(
        &self,
        input: &Path,
        output: &Path,
        guard: &ConversionGuard,
    ) -> Result<ConversionSummary> {
        let start_time = Instant::now();
        let parsed = self.parser.parse_file(input)?;

        let mut attributes = parsed.attributes;
        if let Some(template) = &self.template {
            template.apply(&mut attributes, &self.profile);
        }
        let mismatches = validate_attribute_types(&attributes);
        if mismatches > 0 {
            debug!("{} attributes kept as text in {}", mismatches, input.display());
        }
        attributes.extend(bin_attributes(&parsed.bins));

        let assembler = TrajectoryAssembler::new(input, &self.config);
        let layout = assembler.assemble(&parsed.store, &attributes)?;
        let dataset = assembler.build_dataset(&parsed.store, &layout, attributes);

        let staged = staging_path(output);
        let report = self
            .write_staged(&dataset, &staged)
            .and_then(|report| {
                if guard.try_commit() {
                    Ok(report)
                } else {
                    Err(TagError::ConversionFailed {
                        path: input.to_path_buf(),
                        reason: "abandoned after its deadline; output discarded".to_string(),
                    })
                }
            })
            .and_then(|report| {
                std::fs::rename(&staged, output)
                    .map(|_| report)
                    .map_err(|e| TagError::writer(output, e))
            })
            .inspect_err(|_| discard_staged(&staged))?;

        let summary = ConversionSummary {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            trajectory_id: dataset.trajectory_id.clone(),
            samples: report.rows_written,
            variables: dataset
                .data_variable_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            dropped_variables: dataset.dropped_variables.clone(),
            lines_read: parsed.stats.total_lines,
            lines_skipped: parsed.stats.lines_skipped,
            matchup_misses: dataset.matchup.misses,
            processing_time_ms: start_time.elapsed().as_millis(),
        };

        info!(
            "Converted {} -> {} ({} samples, {} data variables)",
            input.display(),
            summary.output_path.display(),
            summary.samples,
            summary.variables.len()
        );
        Ok(summary)
    }

    fn write_staged(&self, dataset: &TrajectoryDataset, staged: &Path) -> Result<WriteReport> {
        let options = WriterOptions::default().with_grouped(self.config.grouped_output);
        let mut writer = ParquetTrajectoryWriter::new(staged, options);
        let report = writer.write(dataset)?;
        StatisticsFinalizer::new(self.config.matchup_mode).finalize(&mut writer)?;
        Ok(report)
    }
}

/// Hidden sibling that holds an output until both write passes are done
pub fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    output.with_file_name(format!(".{}.{}", name, STAGING_EXTENSION))
}

fn discard_staged(staged: &Path) {
    if staged.exists() {
        if let Err(e) = std::fs::remove_file(staged) {
            warn!("Could not remove staged output {}: {}", staged.display(), e);
        } else {
            debug!("Removed staged output {}", staged.display());
        }
    }
}

const RUNNING: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// Decides who wins when a conversion finishes around its deadline
///
/// The conversion claims the right to publish its output just before the
/// final rename; the batch abandons it when the deadline passes. Exactly one
/// of the two succeeds.
#[derive(Debug, Default)]
pub struct ConversionGuard {
    state: AtomicU8,
}

impl ConversionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// False once the conversion has been abandoned
    pub fn try_commit(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// False if the conversion is already publishing its output
    pub fn abandon(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

enum FileOutcome {
    Converted(ConversionSummary),
    Failed(FailedFile),
}

fn failed(path: &Path, error: TagError) -> FileOutcome {
    error!("Failed to convert {}: {}", path.display(), error);
    FileOutcome::Failed(FailedFile {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

/// Runs many conversions concurrently; partial success is the normal outcome
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    converter: Arc<TrajectoryConverter>,
    show_progress: bool,
}

impl BatchProcessor {
    pub fn new(converter: TrajectoryConverter) -> Self {
        Self {
            converter: Arc::new(converter),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Convert every file into `output_dir`
    pub async fn process(&self, files: &[PathBuf], output_dir: &Path) -> Result<BatchReport> {
        let start_time = Instant::now();
        let config = self.converter.config();
        tokio::fs::create_dir_all(output_dir).await?;

        let mut claimed = HashSet::new();
        let mut jobs = Vec::with_capacity(files.len());
        let mut report = BatchReport::default();
        for input in files {
            let output = self.converter.output_path_for(input, output_dir);
            if !claimed.insert(output.clone()) {
                warn!(
                    "{} maps to an output already claimed in this batch",
                    input.display()
                );
                report.failed.push(FailedFile {
                    path: input.clone(),
                    reason: format!("output {} collides with another input", output.display()),
                });
            } else if output.exists() && !config.overwrite {
                debug!("Skipping {}: {} exists", input.display(), output.display());
                report.skipped.push(input.clone());
            } else {
                jobs.push((input.clone(), output));
            }
        }

        let pb = if self.show_progress && !jobs.is_empty() {
            create_progress_bar(jobs.len() as u64, "Converting tag files")
        } else {
            ProgressBar::hidden()
        };

        let limit = config.max_concurrent_files.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let file_timeout = config.file_timeout;
        info!(
            "Converting {} files with up to {} concurrent conversions",
            jobs.len(),
            limit
        );

        let outcomes: Vec<FileOutcome> = stream::iter(jobs)
            .map(|(input, output)| {
                let converter = self.converter.clone();
                let semaphore = semaphore.clone();
                let pb = pb.clone();
                async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return failed(
                                &input,
                                TagError::ConversionFailed {
                                    path: input.clone(),
                                    reason: format!("Failed to acquire conversion permit: {}", e),
                                },
                            );
                        }
                    };
                    if let Some(file_name) = input.file_name() {
                        pb.set_message(format!("Converting: {}", file_name.to_string_lossy()));
                    }

                    let guard = Arc::new(ConversionGuard::new());
                    let mut handle = task::spawn_blocking({
                        let input = input.clone();
                        let guard = guard.clone();
                        move || converter.convert_guarded(&input, &output, &guard)
                    });

                    let joined = match file_timeout {
                        Some(deadline) => match tokio::time::timeout(deadline, &mut handle).await {
                            Ok(joined) => joined,
                            // The blocking thread cannot be stopped; abandoning it makes it discard its output
                            Err(_) if guard.abandon() => {
                                pb.inc(1);
                                return failed(
                                    &input,
                                    TagError::Timeout {
                                        path: input.clone(),
                                        timeout: deadline,
                                    },
                                );
                            }
                            // Already publishing; the rename is about to land
                            Err(_) => handle.await,
                        },
                        None => handle.await,
                    };
                    pb.inc(1);

                    match joined {
                        Ok(Ok(summary)) => FileOutcome::Converted(summary),
                        Ok(Err(e)) => failed(&input, e),
                        Err(e) => failed(
                            &input,
                            TagError::ConversionFailed {
                                path: input.clone(),
                                reason: format!("Conversion task failed: {}", e),
                            },
                        ),
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                FileOutcome::Converted(summary) => report.converted.push(summary),
                FileOutcome::Failed(failure) => report.failed.push(failure),
            }
        }
        report.converted.sort_by(|a, b| a.input_path.cmp(&b.input_path));
        report.failed.sort_by(|a, b| a.path.cmp(&b.path));
        report.skipped.sort();
        report.processing_time_ms = start_time.elapsed().as_millis();

        pb.finish_with_message(format!(
            "{} converted, {} failed",
            report.converted.len(),
            report.failed.len()
        ));
        info!(
            "Batch complete: {} converted, {} skipped, {} failed in {}ms",
            report.converted.len(),
            report.skipped.len(),
            report.failed.len(),
            report.processing_time_ms
        );

        Ok(report)
    }
}

fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}
