//! ClipCast pipeline worker binary.

mod adapters;
mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipcast_intel::IntelClient;
use clipcast_pipeline::PipelineOrchestrator;
use clipcast_store::{JsonFileStore, StateStore};

use crate::adapters::{ChannelDiscovery, FfmpegTransform, IntelBridge, WorkerTransport};
use crate::config::WorkerConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production.
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipcast=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting clipcast-worker");

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&config.state_dir));

    let intel = match IntelClient::new(config.intel.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create intelligence client: {}", e);
            std::process::exit(1);
        }
    };

    let transport = match WorkerTransport::new(
        config.publish_api_url.clone(),
        config.publish_api_key.clone(),
        config.media_timeout_secs(),
    ) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to create publish transport: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let orchestrator = match PipelineOrchestrator::new(
        config.to_pipeline_config(),
        store,
        ChannelDiscovery::new(config.source_channel_url.clone(), config.media_timeout_secs()),
        transport,
        FfmpegTransform::new(config.media_timeout_secs()),
        IntelBridge::new(intel),
        shutdown_rx,
    ) {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to build orchestrator: {}", e);
            std::process::exit(1);
        }
    };

    match orchestrator.run().await {
        Ok(summary) => {
            info!(%summary, "run complete");
            if !summary.is_clean() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Pipeline error: {}", e);
            std::process::exit(2);
        }
    }

    info!("Worker shutdown complete");
}
