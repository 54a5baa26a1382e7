//! Command-line interface for the tag trajectory converter
//!
//! Argument definitions, layering of CLI flags over a loaded configuration,
//! and logging setup for the binary.

use crate::config::{ConversionConfig, MatchupMode};
use crate::constants::DEFAULT_OUTPUT_DIR;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Convert animal-tag telemetry logs into time-aligned trajectory files
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tag-trajectory",
    version,
    about = "Convert irregularly sampled tag telemetry logs into trajectory Parquet files",
    long_about = "Parses tag telemetry flat files (plain or gzip), aligns every variable onto \
                  a single time axis and writes one trajectory file per input, with global \
                  attributes, histogram bin definitions and per-variable bounds."
)]
pub struct Args {
    /// Input files or directories
    ///
    /// Directories are walked recursively and matched against --pattern.
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory, created if missing
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = DEFAULT_OUTPUT_DIR,
        help = "Output directory for trajectory files"
    )]
    pub output_dir: PathBuf,

    /// Metadata profile (JSON list of {name, group, type})
    #[arg(long = "profile", value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Template whose global attributes override the file's own
    #[arg(long = "template", value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Configuration file (JSON); CLI flags override its values
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Use the densest stream as the time axis and record location freshness
    #[arg(long = "many-observations")]
    pub many_observations: bool,

    /// Write global attributes without group prefixes
    #[arg(long = "flat")]
    pub flat: bool,

    /// Maximum sample count drift for a variable to be kept
    #[arg(long = "tolerance", value_name = "N")]
    pub tolerance: Option<usize>,

    /// Number of files converted concurrently
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-file conversion deadline in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// File name pattern used when walking directories (repeatable)
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Replace existing output files instead of skipping them
    #[arg(long = "overwrite")]
    pub overwrite: bool,

    /// Format of the final report
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: ReportFormat,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable debug logging",
        conflicts_with = "quiet"
    )]
    pub verbose: bool,

    #[arg(short = 'q', long = "quiet", help = "Only show warnings and errors")]
    pub quiet: bool,
}

/// Final report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Layer command-line flags over a loaded configuration
    pub fn apply_overrides(&self, mut config: ConversionConfig) -> ConversionConfig {
        if self.many_observations {
            config.matchup_mode = MatchupMode::OneLocationManyObservations;
        }
        if self.flat {
            config.grouped_output = false;
        }
        if let Some(tolerance) = self.tolerance {
            config.series_tolerance = tolerance;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_files = jobs;
        }
        if let Some(seconds) = self.timeout {
            config.file_timeout = Some(Duration::from_secs(seconds));
        }
        if !self.patterns.is_empty() {
            config.file_patterns = self.patterns.clone();
        }
        if self.overwrite {
            config.overwrite = true;
        }
        config
    }
}

/// Default filter directive when `RUST_LOG` is unset
///
/// Verbose runs also let through the Parquet writer's own warnings.
pub fn default_log_directive(args: &Args) -> String {
    let level = args.get_log_level();
    if args.verbose {
        format!("tag_trajectory={},parquet=warn", level)
    } else {
        format!("tag_trajectory={}", level)
    }
}

/// Set up structured logging on stderr; `RUST_LOG` takes precedence
///
/// Quiet runs get compact untimed lines. Otherwise lines carry the uptime,
/// and verbose runs add the module target and thread id so interleaved
/// batch conversions can be told apart.
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(args)));

    let compact = args.quiet.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
    });
    let timed = (!args.quiet).then(|| {
        fmt::layer()
            .with_target(args.verbose)
            .with_thread_ids(args.verbose)
            .with_timer(fmt::time::uptime())
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(timed)
        .init();

    debug!("Logging initialized at level: {}", args.get_log_level());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_arguments() {
        let args = Args::try_parse_from(["tag-trajectory", "logs/"]).unwrap();
        assert_eq!(args.inputs, vec![PathBuf::from("logs/")]);
        assert_eq!(args.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(args.format, ReportFormat::Text);
        assert_eq!(args.get_log_level(), "info");
    }

    #[test]
    fn test_inputs_are_required() {
        assert!(Args::try_parse_from(["tag-trajectory"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["tag-trajectory", "-v", "-q", "a.txt"]).is_err());
        let args = Args::try_parse_from(["tag-trajectory", "-q", "a.txt"]).unwrap();
        assert_eq!(args.get_log_level(), "warn");
        assert_eq!(default_log_directive(&args), "tag_trajectory=warn");
    }

    #[test]
    fn test_verbose_directive_includes_writer_warnings() {
        let args = Args::try_parse_from(["tag-trajectory", "-v", "a.txt"]).unwrap();
        assert_eq!(default_log_directive(&args), "tag_trajectory=debug,parquet=warn");
    }

    #[test]
    fn test_overrides_layer_over_config() {
        let args = Args::try_parse_from([
            "tag-trajectory",
            "--many-observations",
            "--flat",
            "--tolerance",
            "3",
            "-j",
            "2",
            "--timeout",
            "30",
            "--pattern",
            "*.log",
            "--pattern",
            "*.dat",
            "--format",
            "json",
            "a.txt",
            "b.txt",
        ])
        .unwrap();
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.format, ReportFormat::Json);

        let config = args.apply_overrides(ConversionConfig::default());
        assert_eq!(config.matchup_mode, MatchupMode::OneLocationManyObservations);
        assert!(!config.grouped_output);
        assert_eq!(config.series_tolerance, 3);
        assert_eq!(config.max_concurrent_files, 2);
        assert_eq!(config.file_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.file_patterns, vec!["*.log", "*.dat"]);
        assert!(!config.overwrite);
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let args = Args::try_parse_from(["tag-trajectory", "a.txt"]).unwrap();
        let base = ConversionConfig::default()
            .with_series_tolerance(7)
            .with_overwrite(true);
        let config = args.apply_overrides(base);
        assert_eq!(config.series_tolerance, 7);
        assert!(config.overwrite);
        assert!(config.grouped_output);
    }
}
