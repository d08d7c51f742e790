//! Cluster Metrics Adapter
//!
//! Serves node-derived `controlplanes` and `workers` metrics through the
//! custom and external metrics APIs for horizontal pod autoscaling.

use adapter_lib::{
    health::components,
    server::{self, AppState},
    ClusterProvider, HealthRegistry, KubeNodeInventory, KubeObjectResolver, StructuredLogger,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const ADAPTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AdapterConfig::load()?;
    info!(instance = %config.instance, port = config.api_port, "Adapter configured");

    let client = kube::Client::try_default()
        .await
        .context("Unable to construct Kubernetes client")?;

    let logger = StructuredLogger::new(&config.instance);
    let provider = ClusterProvider::new(
        Arc::new(KubeNodeInventory::new(client.clone())),
        Arc::new(KubeObjectResolver::new(client)),
    )
    .with_control_plane_label(&config.control_plane_label)
    .with_logger(logger.clone());

    let health_registry = HealthRegistry::new();
    health_registry.register(components::NODE_INVENTORY).await;
    health_registry.register(components::OBJECT_RESOLVER).await;

    let app_state = Arc::new(AppState::new(
        Arc::new(provider),
        health_registry.clone(),
        config.query_timeout(),
    ));

    logger.log_startup(ADAPTER_VERSION, &config.message);
    health_registry.set_ready(true).await;

    tokio::select! {
        result = server::serve(config.api_port, app_state) => {
            result.context("Unable to run metrics adapter")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
