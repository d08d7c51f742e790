//! Node inventory backed by the Kubernetes API

use crate::models::NodeSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Source of the current cluster node set
#[async_trait]
pub trait NodeInventory: Send + Sync {
    /// List all nodes with their labels. No retry, no cache.
    async fn list_nodes(&self, cancel: &CancellationToken) -> Result<Vec<NodeSnapshot>>;
}

/// Lists `v1/Node` objects through the API server
#[derive(Clone)]
pub struct KubeNodeInventory {
    client: kube::Client,
}

impl KubeNodeInventory {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeInventory for KubeNodeInventory {
    async fn list_nodes(&self, cancel: &CancellationToken) -> Result<Vec<NodeSnapshot>> {
        let api: Api<Node> = Api::all(self.client.clone());

        let params = ListParams::default();
        let list = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("node listing cancelled"),
            list = api.list(&params) => list.context("Failed to list nodes")?,
        };

        debug!("Found {} nodes", list.items.len());

        Ok(list
            .items
            .into_iter()
            .map(|node| NodeSnapshot {
                name: node.metadata.name.unwrap_or_default(),
                labels: node.metadata.labels.unwrap_or_default(),
            })
            .collect())
    }
}
