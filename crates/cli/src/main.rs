//! Cluster Metrics Adapter CLI
//!
//! A command-line tool for listing and querying the node-derived metrics
//! served by the cluster metrics adapter.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::metrics;

/// Cluster Metrics Adapter CLI
#[derive(Parser)]
#[command(name = "cma")]
#[command(author, version, about = "CLI for the Cluster Metrics Adapter", long_about = None)]
pub struct Cli {
    /// Adapter endpoint URL (can also be set via CMA_API_URL env var)
    #[arg(long, env = "CMA_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the custom and external metric catalogs
    List,

    /// Query metric values
    #[command(subcommand)]
    Get(GetCommands),
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Get a cluster-scoped external metric
    External {
        /// Metric name (controlplanes or workers)
        metric: String,

        /// Namespace of the query
        #[arg(long, short, default_value = "default")]
        namespace: String,
    },

    /// Get the metric of a single object
    Object {
        /// Target resource, e.g. pods or deployments.apps
        resource: String,

        /// Object name
        name: String,

        /// Metric name
        metric: String,

        /// Namespace of the object (root-scoped if not specified)
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Get the metric of every object matching a label selector
    Selector {
        /// Target resource, e.g. pods or deployments.apps
        resource: String,

        /// Metric name
        metric: String,

        /// Label selector, e.g. app=web
        #[arg(long, short = 'l')]
        selector: Option<String>,

        /// Namespace of the objects (root-scoped if not specified)
        #[arg(long, short)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::List => {
            metrics::list_metrics(&client, cli.format).await?;
        }
        Commands::Get(get_cmd) => match get_cmd {
            GetCommands::External { metric, namespace } => {
                metrics::get_external_metric(&client, &namespace, &metric, cli.format).await?;
            }
            GetCommands::Object {
                resource,
                name,
                metric,
                namespace,
            } => {
                metrics::get_object_metric(&client, namespace, &resource, &name, &metric, cli.format)
                    .await?;
            }
            GetCommands::Selector {
                resource,
                metric,
                selector,
                namespace,
            } => {
                metrics::get_selector_metric(&client, namespace, &resource, &metric, selector, cli.format)
                    .await?;
            }
        },
    }

    Ok(())
}
