//! Mileage Watch - odometer deviation service
//!
//! # Usage
//!
//! ```bash
//! # Serve the upload API (default command)
//! mileage-watch serve --addr 0.0.0.0:5000
//!
//! # Run one spreadsheet offline against the configured baseline
//! mileage-watch process readings.xlsx --date 2024-03-07
//! ```
//!
//! # Environment Variables
//!
//! - `MILEAGE_WATCH_CONFIG`: Path to a TOML config file
//! - `MILEAGE_WATCH_SERVER_ADDR`: Bind address override
//! - `MILEAGE_WATCH_CORS_ORIGINS`: Comma-separated allowed origins
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_BASELINE`: Set to "true" to delete the baseline on startup

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use mileage_watch::api::handlers::UploadResponse;
use mileage_watch::api::{create_app, AppState};
use mileage_watch::config::{defaults, ServiceConfig};
use mileage_watch::storage::DataDirLock;
use mileage_watch::{report, DeviationPipeline};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "mileage-watch")]
#[command(about = "Fleet odometer deviation detection with a ratcheting baseline")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the standard search order)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:5000")
    #[arg(short, long, global = true, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Delete the persisted baseline before starting.
    /// The next upload becomes a first run.
    /// Can also be set via RESET_BASELINE=true environment variable.
    #[arg(long, global = true)]
    reset_baseline: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Serve the HTTP upload API
    Serve,

    /// Process one spreadsheet and print the outcome as JSON
    Process {
        /// Spreadsheet to ingest (.xlsx, .xls, .xlsb, .ods or .csv)
        file: PathBuf,
        /// Report date (default: today, local time)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
}

// ============================================================================
// Baseline Reset
// ============================================================================

/// Check if a baseline reset is requested via CLI flag or environment variable.
fn should_reset_baseline(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_BASELINE") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

fn reset_baseline(pipeline: &DeviationPipeline) -> Result<()> {
    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    warn!("  RESET_BASELINE DETECTED - DISCARDING ACCEPTED MILEAGE SNAPSHOT");
    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let removed = pipeline
        .store()
        .reset()
        .context("Failed to remove baseline file")?;

    if removed {
        warn!("  Removed: {}", pipeline.baseline_path().display());
        warn!("  The next upload will seed a fresh baseline.");
    } else {
        info!("No baseline file present, nothing to reset");
    }
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ServiceConfig::load()),
    }
}

/// CLI flag, then environment, then config file.
fn resolve_server_addr(cli_addr: Option<String>, config: &ServiceConfig) -> String {
    cli_addr
        .or_else(|| std::env::var(defaults::SERVER_ADDR_ENV_VAR).ok())
        .unwrap_or_else(|| config.server.addr.clone())
}

// ============================================================================
// Commands
// ============================================================================

async fn run_server(state: AppState, server_addr: &str, cancel_token: CancellationToken) -> Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("Failed to bind {server_addr}"))?;

    info!("🌐 Listening on http://{}", server_addr);
    info!("   POST /upload            spreadsheet ingestion");
    info!("   GET  /download_report   today's deviation report");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    match result {
        Ok(()) => {
            info!("[HttpServer] Graceful shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("[HttpServer] Server error: {}", e);
            Err(anyhow::anyhow!("HTTP server error: {}", e))
        }
    }
}

fn run_process(pipeline: &DeviationPipeline, file: &Path, date: NaiveDate) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let outcome = pipeline
        .process_upload(&filename, &bytes, date)
        .context("Deviation run failed")?;

    match UploadResponse::from_outcome(outcome) {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e) => {
            let body = serde_json::json!({ "error": { "code": e.code(), "message": e.to_string() } });
            println!("{}", serde_json::to_string_pretty(&body)?);
            anyhow::bail!("{} rejected: {}", file.display(), e)
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = load_config(args.config.as_deref())?;
    info!(
        "Baseline: {} | Reports: {} | Thresholds: {} categories",
        config.storage.baseline_path().display(),
        config.storage.report_dir.display(),
        config.thresholds.len()
    );

    // One instance per data directory, taken before anything touches the baseline
    let _data_lock = DataDirLock::acquire(&config.storage.data_dir)
        .context("Failed to lock data directory")?;

    let state = AppState::from_config(&config);

    if should_reset_baseline(args.reset_baseline) {
        reset_baseline(&state.pipeline)?;
    }

    match args.command.unwrap_or(SubCommand::Serve) {
        SubCommand::Process { file, date } => {
            let date = date.unwrap_or_else(report::today);
            let pipeline = std::sync::Arc::clone(&state.pipeline);
            tokio::task::spawn_blocking(move || run_process(&pipeline, &file, date))
                .await
                .context("Processing task panicked")??;
        }
        SubCommand::Serve => {
            let server_addr = resolve_server_addr(args.addr, &config);

            info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            info!("  Mileage Watch v{}", env!("CARGO_PKG_VERSION"));
            info!("  Odometer deviation detection");
            info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

            // Graceful shutdown via Ctrl+C
            let cancel_token = CancellationToken::new();
            let shutdown_token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("🛑 Received Ctrl+C, initiating shutdown...");
                shutdown_token.cancel();
            });

            run_server(state, &server_addr, cancel_token).await?;
            info!("✓ Mileage Watch shutdown complete");
        }
    }

    Ok(())
}
