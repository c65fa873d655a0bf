//! sjisconv - Convert text files between UTF-8 and Shift-JIS
//!
//! Each input file's encoding is detected: UTF-8 files are written out as
//! Shift-JIS, everything else is read as Shift-JIS and written as UTF-8.
//! Directory inputs are walked recursively into a flat output directory.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sjisconv_core::{
    ConvertConfig, FileReport, MalformedPolicy, TranscodeOptions, Transcoder, TreeWalker,
    WalkSummary,
};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Convert text files between UTF-8 and Shift-JIS
#[derive(Parser, Debug)]
#[command(name = "sjisconv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Input file or directory
    #[arg(short, long)]
    input: PathBuf,

    /// Output file or directory (created as a directory if missing)
    #[arg(short, long, default_value = sjisconv_core::config::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Handling of malformed UTF-8 input
    #[arg(long, value_enum, default_value = "truncate")]
    on_malformed: MalformedMode,

    /// Dry run - detect encodings and show what would be converted
    #[arg(long)]
    dry_run: bool,
}

/// Malformed-input handling for UTF-8 sources
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MalformedMode {
    /// Stop at the first malformed sequence and drop the rest of the file
    Truncate,
    /// Write '?' for each malformed sequence and keep going
    Replace,
}

impl From<MalformedMode> for MalformedPolicy {
    fn from(mode: MalformedMode) -> Self {
        match mode {
            MalformedMode::Truncate => MalformedPolicy::Truncate,
            MalformedMode::Replace => MalformedPolicy::Replace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let config = ConvertConfig::resolve(&cli.input, &cli.output).with_context(|| {
        format!(
            "Invalid arguments: input {} / output {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;
    debug!("{:?}", config);

    let transcoder =
        Transcoder::with_options(TranscodeOptions::new().on_malformed(cli.on_malformed.into()));
    let walker = TreeWalker::new(config)
        .transcoder(transcoder)
        .dry_run(cli.dry_run);

    let summary = walker
        .walk_with(|report| print_report(report, cli.dry_run))
        .with_context(|| format!("Conversion of {} failed", cli.input.display()))?;

    print_summary(&summary);
    info!("done");
    Ok(())
}

fn print_report(report: &FileReport, dry_run: bool) {
    if dry_run {
        println!(
            "Would convert: {} -> {} ({}, detected {})",
            report.job.input.display(),
            report.job.output.display(),
            report.direction,
            report.verdict
        );
    } else {
        println!(
            "Converted {} -> {} ({})",
            report.job.input.display(),
            report.job.output.display(),
            report.direction
        );
    }
}

fn print_summary(summary: &WalkSummary) {
    info!(
        "Summary: {} files ({} to Shift_JIS, {} to UTF-8), {} placeholders, {} truncated, {} overwritten",
        summary.files,
        summary.to_shift_jis,
        summary.to_utf8,
        summary.placeholders,
        summary.truncated,
        summary.collisions
    );
}
