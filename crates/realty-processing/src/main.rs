//! CLI entry point for the listing unification pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use realty_processing::{
    BUILTIN_SOURCES, Pipeline, PipelineConfig, RunSummary, SourceStatus, builtin_layouts,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Real-estate listing unification pipeline",
    long_about = "Merges listing exports from 16 sources into one canonical, deduplicated,\n\
                  outlier-trimmed and enriched CSV dataset.\n\n\
                  EXAMPLES:\n  \
                  # Run with the built-in source catalog\n  \
                  realty-processing --data-dir data/ -o output/\n\n  \
                  # Run with a configuration file\n  \
                  realty-processing --config pipeline.json\n\n  \
                  # Print the run summary as JSON only\n  \
                  realty-processing --json | jq .totals"
)]
struct Args {
    /// JSON configuration file
    ///
    /// Fields left out of the file keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the source files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file name (without extension)
    #[arg(long)]
    output_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the run summary as JSON to stdout instead of the human-readable summary
    ///
    /// Disables all logs.
    #[arg(long)]
    json: bool,

    /// Print the built-in source catalog and exit
    #[arg(long)]
    list_sources: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Do not write the rejections file
    #[arg(long)]
    no_rejections: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if args.list_sources {
        print_source_catalog();
        return Ok(());
    }

    let config = load_config(&args)?;

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    info!("{}", "=".repeat(80));
    info!("Starting listing unification pipeline...");
    info!("{}", "=".repeat(80));

    let outcome = pipeline.run().map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    if args.json {
        println!("{}", outcome.summary.to_json_pretty()?);
        return Ok(());
    }

    print_human_readable_summary(&outcome.summary);
    Ok(())
}

/// Build the effective configuration: file (or defaults), then CLI overrides.
fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }
    if let Some(name) = &args.output_name {
        config.output_name = name.clone();
    }
    if args.no_rejections {
        config.write_rejections = false;
    }

    config.validate()?;
    Ok(config)
}

/// Print the built-in sources in priority order.
///
/// Uses `println!` since this is the requested output, not a log line.
fn print_source_catalog() {
    println!("{:<4} {:<22} {:<42} Required columns", "#", "Source", "File");
    println!("{}", "-".repeat(100));
    for (rank, layout) in builtin_layouts().iter().enumerate() {
        println!(
            "{:<4} {:<22} {:<42} {}",
            rank,
            layout.name,
            layout.file.display(),
            layout.required_columns().join(", ")
        );
    }
    println!();
    println!("{} sources", BUILTIN_SOURCES.len());
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(summary: &RunSummary) {
    println!();
    println!("{}", "=".repeat(80));
    println!("UNIFICATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Output: {} ({} listings)",
        summary.output_file.display(),
        summary.totals.retained
    );
    if let Some(path) = &summary.rejections_file {
        println!("Rejections: {}", path.display());
    }
    println!("Duration: {}ms", summary.duration_ms);
    println!();

    println!("Sources:");
    println!(
        "  {:<22} {:<16} {:>8} {:>9} {:>9}",
        "Name", "Status", "Read", "Accepted", "Retained"
    );
    for source in &summary.sources {
        println!(
            "  {:<22} {:<16} {:>8} {:>9} {:>9}",
            source.name,
            source.status.as_str(),
            source.rows_read,
            source.rows_accepted,
            source.rows_retained
        );
        if let SourceStatus::SchemaMismatch { missing_columns } = &source.status {
            println!("    missing columns: {}", missing_columns.join(", "));
        }
    }
    println!();

    println!("Rows:");
    println!("  Ingested: {}", summary.totals.ingested);
    println!("  Dropped:  {}", summary.totals.dropped);
    println!("  Retained: {}", summary.totals.retained);
    println!();

    if !summary.dropped_by_reason.is_empty() {
        println!("Dropped by reason:");
        for (reason, count) in &summary.dropped_by_reason {
            println!("  {:<36} {:>8}", reason, count);
        }
        println!();
    }

    println!("Column completeness:");
    for column in &summary.column_completeness {
        println!("  {:<22} {:>6.1}%", column.column, column.percent);
    }

    println!();
    println!("{}", "=".repeat(80));
}
