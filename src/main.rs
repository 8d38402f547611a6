//! gateway-sync - Keeps Zero Trust gateway lists and rules in sync with domain blocklists
//!
//! This is the main entry point for the gateway-sync application.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gateway_sync::config::Config;
use gateway_sync::downloader::{BlocklistDownloader, DEFAULT_DOWNLOAD_TIMEOUT};
use gateway_sync::gateway::GatewayClient;
use gateway_sync::logging::init_tracing;
use gateway_sync::reconcile::{ReconcileSettings, Reconciler, RunSummary};

/// gateway-sync - Keeps Zero Trust gateway lists and rules in sync with domain blocklists
#[derive(Parser, Debug)]
#[command(name = "gateway-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file; environment variables override it
    #[arg(short, long, env = "GATEWAY_SYNC_CONFIG")]
    config: Option<String>,

    /// Log the planned changes without creating, updating or deleting anything
    #[arg(long, env = "DRY_RUN", value_parser = clap::builder::BoolishValueParser::new())]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Load and validate configuration before any network activity
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing/logging
    if let Err(e) = init_tracing(&config.logging.level, &config.logging.format) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dry_run = config.behavior.dry_run,
        "Starting gateway-sync"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    match run(&config, &cancel).await {
        Ok(summary) => {
            info!(
                rules_deleted = summary.rules_cleanup.deleted,
                lists_deleted = summary.lists_cleanup.deleted,
                lists_created = summary.created_list_ids.len(),
                chunks_planned = summary.planned_chunks.len(),
                rules_upserted = summary.upserted_rules.len(),
                "gateway-sync finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "gateway-sync failed");
            ExitCode::FAILURE
        }
    }
}

/// Download the sources and reconcile the account
async fn run(config: &Config, cancel: &CancellationToken) -> anyhow::Result<RunSummary> {
    let downloader = BlocklistDownloader::new(config.retry.clone(), DEFAULT_DOWNLOAD_TIMEOUT)?;
    let sets = downloader
        .download_and_process(
            &config.sources.allow_urls,
            &config.sources.block_urls,
            cancel,
        )
        .await
        .context("Failed to download domain lists")?;

    if sets.allow.is_empty() && sets.block.is_empty() {
        warn!("No domains downloaded, existing lists will be removed");
    }

    let client = GatewayClient::from_config(config).context("Failed to create API client")?;
    let reconciler = Reconciler::new(Arc::new(client), ReconcileSettings::from_config(config));

    let summary = reconciler.run(&sets.allow, &sets.block, cancel).await?;
    Ok(summary)
}

/// Load configuration from file and environment, then validate it
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            eprintln!("Loading configuration from file: {}", path);
            let mut config = Config::from_file(path).context("Failed to load config")?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => Config::from_env(),
    };

    if args.dry_run {
        config.behavior.dry_run = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Cancel `token` when a shutdown signal is received
async fn cancel_on_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling run");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling run");
        }
    }

    token.cancel();
}
