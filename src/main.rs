use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tag_trajectory::cli::{Args, ReportFormat, setup_logging};
use tag_trajectory::constants::{APP_CONFIG_DIR, DEFAULT_PROFILE_FILE};
use tag_trajectory::processor::discovery::discover_input_files;
use tag_trajectory::{
    BatchProcessor, BatchReport, ConversionConfig, MetadataProfile, Template, TrajectoryConverter,
};
use tracing::{debug, info, warn};

fn main() {
    let args = Args::parse();
    setup_logging(&args);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let shutdown_signal = async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = run(&args) => result,
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(anyhow::anyhow!("Conversion interrupted by user"))
            }
        }
    });

    match result {
        Ok(report) if report.all_failed() => {
            eprintln!("{}", "Every input file failed to convert".red().bold());
            process::exit(1);
        }
        Ok(_) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

async fn run(args: &Args) -> Result<BatchReport> {
    let config = load_configuration(args)?;
    let profile = load_profile(args)?;

    let mut converter = TrajectoryConverter::new(config.clone(), Arc::new(profile));
    if let Some(path) = &args.template {
        let template = Template::load(path)
            .with_context(|| format!("Failed to load template {}", path.display()))?;
        converter = converter.with_template(Arc::new(template));
    }

    let files = discover_input_files(&args.inputs, &config.file_patterns)
        .context("Failed to collect input files")?;
    if files.is_empty() {
        anyhow::bail!("No input files matched {:?}", config.file_patterns);
    }
    info!("Found {} input files", files.len());

    let report = BatchProcessor::new(converter)
        .with_progress(!args.quiet)
        .process(&files, &args.output_dir)
        .await
        .context("Batch conversion failed")?;

    match args.format {
        ReportFormat::Text => print_report(&report, args.quiet),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(report)
}

/// Defaults, then the config file, then command-line flags
fn load_configuration(args: &Args) -> Result<ConversionConfig> {
    let config = match &args.config_file {
        Some(path) => ConversionConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ConversionConfig::default(),
    };
    let config = args.apply_overrides(config);
    config.validate().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// `--profile`, else the profile in the user config directory, else empty
fn load_profile(args: &Args) -> Result<MetadataProfile> {
    let path = args.profile.clone().or_else(default_profile_path);
    match path {
        Some(path) => {
            let profile = MetadataProfile::load(&path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?;
            info!("Loaded {} profile entries from {}", profile.len(), path.display());
            Ok(profile)
        }
        None => {
            debug!("No metadata profile; all attributes go to the root group as text");
            Ok(MetadataProfile::default())
        }
    }
}

fn default_profile_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?
        .join(APP_CONFIG_DIR)
        .join(DEFAULT_PROFILE_FILE);
    path.exists().then_some(path)
}

fn print_report(report: &BatchReport, quiet: bool) {
    if !quiet {
        println!();
        println!("{}", "Conversion Summary".bright_green().bold());
        println!("{}", "==================".bright_green());
        for summary in &report.converted {
            println!(
                "  {} {} -> {} ({} samples, {} variables{})",
                "✓".green(),
                summary.input_path.display(),
                summary.output_path.display().to_string().bright_cyan(),
                summary.samples,
                summary.variables.len(),
                if summary.matchup_misses > 0 {
                    format!(", {} matchup misses", summary.matchup_misses)
                } else {
                    String::new()
                }
            );
        }
        for path in &report.skipped {
            println!(
                "  {} {} (output exists)",
                "-".bright_black(),
                path.display().to_string().bright_black()
            );
        }
    }
    for failure in &report.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.path.display(),
            failure.reason.red()
        );
    }

    println!(
        "{} converted, {} skipped, {} failed, {} samples in {:.2}s",
        report.converted.len().to_string().green().bold(),
        report.skipped.len().to_string().yellow(),
        report.failed.len().to_string().red(),
        report.total_samples(),
        report.processing_time_ms as f64 / 1000.0
    );
}
