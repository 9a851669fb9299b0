//! GEFSv12 reforecast reference builder.
//!
//! Builds one kerchunk reference manifest over a (time, member) grid of
//! archived GRIB2 files:
//! - Fetches every slot's `.idx` inventory and GRIB size (anonymous S3)
//! - Re-points a template reference at the selected message of each file
//! - Writes the consolidated manifest plus a gaps report of fill-valued slots

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use builder::ReferenceBuilder;
use grib_index::MessageSelector;
use manifest::{gaps_path, write_gaps, write_manifest, ReferenceTemplate};
use storage::RemoteArchive;

use config::{Overrides, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "refbuilder")]
#[command(about = "Build kerchunk reference manifests for the GEFSv12 reforecast archive")]
struct Args {
    /// Run configuration (YAML)
    #[arg(short, long, env = "REFBUILDER_CONFIG", default_value = "config/refbuilder.yaml")]
    config: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting reference builder");

    let mut config = if args.config.exists() {
        RunConfig::load(&args.config)?
    } else {
        warn!(path = %args.config.display(), "Config file not found, using defaults");
        RunConfig::default()
    };
    config.apply(&args.overrides);
    config.validate().context("Invalid run configuration")?;

    let spec = config.variable_spec()?;
    let template = ReferenceTemplate::load(&config.template, spec.array)
        .with_context(|| format!("Failed to load template: {}", config.template.display()))?;

    let archive = match &config.archive.http_base {
        Some(base) => RemoteArchive::http(base)?,
        None => RemoteArchive::s3_anonymous(&config.archive_config())?,
    };

    let grid = config.grid()?;
    info!(
        variable = %config.variable,
        forecast_hour = config.forecast_hour,
        times = grid.times().len(),
        members = grid.members().len(),
        mode = ?config.window.mode,
        "Coordinate grid ready"
    );

    let builder = ReferenceBuilder::new(
        archive,
        Arc::new(config.layout()),
        Arc::new(template),
        MessageSelector::for_variable(&spec, config.forecast_hour),
        config.build_options(),
    )?;

    // Handle Ctrl+C
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        cancel_on_signal.cancel();
    });

    let output = builder.build(&grid, &cancel).await?;

    write_manifest(&output.manifest, &config.output)
        .with_context(|| format!("Failed to write manifest: {}", config.output.display()))?;
    let gaps_file = gaps_path(&config.output);
    write_gaps(&output.gaps, &gaps_file)
        .with_context(|| format!("Failed to write gaps report: {}", gaps_file.display()))?;

    info!(
        output = %config.output.display(),
        slots = output.gaps.total_slots,
        references = output.manifest.reference_count(),
        gaps = output.gaps.gaps.len(),
        missing_times = output.gaps.missing_times.len(),
        "Reference build complete"
    );

    Ok(())
}
