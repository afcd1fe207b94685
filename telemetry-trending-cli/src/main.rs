//! Telemetry Trending CLI Application
//!
//! This is the command-line interface for instrument telemetry trending.
//! It uses the telemetry-trending library and adds:
//! - Loading of mission telemetry exports (CSV/JSON)
//! - Configuration-driven condition groups
//! - Daily, lamp and wheel-position routines
//! - JSON report generation

use anyhow::{bail, Result};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod config;
mod loader;
mod report;
mod routines;

/// Telemetry Trending - Condition-filtered instrument telemetry trends
#[derive(Parser, Debug)]
#[command(name = "telemetry-trending-cli")]
#[command(about = "Extract and summarize instrument telemetry trends", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (trending.toml)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Telemetry exports to process (overrides [input] files)
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Output directory for reports (overrides [output] dir)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Telemetry Trending CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using trending library v{}", telemetry_trending::VERSION);

    log::info!("Loading configuration from: {:?}", args.config);
    let config = config::load_config(&args.config)?;
    log::debug!("Configuration loaded successfully");

    let files = if args.files.is_empty() {
        config.input.files.clone()
    } else {
        args.files.clone()
    };
    let output_dir = args.output.clone().unwrap_or_else(|| config.output.dir.clone());

    if files.is_empty() {
        bail!("No telemetry exports given (pass FILES or set [input] files)");
    }

    // Each export is independent: one immutable set of streams per file
    let outcomes: Vec<(PathBuf, Result<PathBuf>)> = files
        .par_iter()
        .map(|path| (path.clone(), process_file(&config, path, &output_dir)))
        .collect();

    let mut failed = 0;
    for (path, outcome) in &outcomes {
        match outcome {
            Ok(report_path) => log::info!("✓ {:?} -> {:?}", path, report_path),
            Err(e) => {
                failed += 1;
                log::error!("✗ {:?}: {:#}", path, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} telemetry exports failed", failed, outcomes.len());
    }

    Ok(())
}

/// Load one export, run all routines and write its report
fn process_file(config: &config::AppConfig, path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let data = loader::load_file(path)?;
    let day_report = routines::process_day(config, path, &data);
    report::write_report(&day_report, output_dir)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
