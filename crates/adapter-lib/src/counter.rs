//! Aggregate node counts
//!
//! Per-object queries report the total node count for every metric, while
//! external queries split nodes by the control-plane role label.

use crate::cancel::run_cancellable;
use crate::catalog::CONTROLPLANES;
use crate::error::{ProviderError, Result};
use crate::inventory::NodeInventory;
use crate::models::NodeSnapshot;
use crate::observability::AdapterMetrics;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Label whose presence marks a node as part of the control plane
pub const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";

/// Computes node counts from a fresh inventory read per call
#[derive(Clone)]
pub struct AggregateCounter {
    inventory: Arc<dyn NodeInventory>,
    control_plane_label: String,
    metrics: AdapterMetrics,
}

impl AggregateCounter {
    pub fn new(inventory: Arc<dyn NodeInventory>) -> Self {
        Self {
            inventory,
            control_plane_label: CONTROL_PLANE_LABEL.to_string(),
            metrics: AdapterMetrics::new(),
        }
    }

    /// Use a different control-plane marker label
    pub fn with_control_plane_label(mut self, label: impl Into<String>) -> Self {
        self.control_plane_label = label.into();
        self
    }

    /// Total number of nodes, whatever metric asked for it
    pub async fn count_all(&self, cancel: &CancellationToken) -> Result<i64> {
        let nodes = self.snapshot(cancel).await?;
        Ok(nodes.len() as i64)
    }

    /// Nodes whose control-plane label presence matches `metric == "controlplanes"`
    pub async fn count_by_predicate(&self, metric: &str, cancel: &CancellationToken) -> Result<i64> {
        let want_control_plane = metric == CONTROLPLANES;
        let nodes = self.snapshot(cancel).await?;

        let count = nodes
            .iter()
            .filter(|node| self.is_control_plane(node) == want_control_plane)
            .count();

        debug!(
            metric = %metric,
            matched = count,
            total = nodes.len(),
            "Counted nodes by control-plane label"
        );

        Ok(count as i64)
    }

    fn is_control_plane(&self, node: &NodeSnapshot) -> bool {
        node.has_label(&self.control_plane_label)
    }

    async fn snapshot(&self, cancel: &CancellationToken) -> Result<Vec<NodeSnapshot>> {
        let nodes = run_cancellable(cancel, async {
            self.inventory
                .list_nodes(cancel)
                .await
                .map_err(|e| ProviderError::InventoryUnavailable(format!("{:#}", e)))
        })
        .await?;

        self.metrics.set_nodes_observed(nodes.len() as i64);
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WORKERS;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticInventory {
        nodes: Vec<NodeSnapshot>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NodeInventory for StaticInventory {
        async fn list_nodes(&self, _cancel: &CancellationToken) -> anyhow::Result<Vec<NodeSnapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.nodes.clone())
        }
    }

    struct FailingInventory;

    #[async_trait]
    impl NodeInventory for FailingInventory {
        async fn list_nodes(&self, _cancel: &CancellationToken) -> anyhow::Result<Vec<NodeSnapshot>> {
            anyhow::bail!("connection refused")
        }
    }

    struct HungInventory;

    #[async_trait]
    impl NodeInventory for HungInventory {
        async fn list_nodes(&self, _cancel: &CancellationToken) -> anyhow::Result<Vec<NodeSnapshot>> {
            std::future::pending().await
        }
    }

    fn node(name: &str, labels: &[(&str, &str)]) -> NodeSnapshot {
        NodeSnapshot {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn cluster(total: usize, control_planes: usize) -> Arc<StaticInventory> {
        let nodes = (0..total)
            .map(|i| {
                if i < control_planes {
                    node(&format!("cp-{}", i), &[(CONTROL_PLANE_LABEL, "")])
                } else {
                    node(&format!("worker-{}", i), &[("kubernetes.io/os", "linux")])
                }
            })
            .collect();
        Arc::new(StaticInventory {
            nodes,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_count_by_predicate_partitions_nodes() {
        let cancel = CancellationToken::new();
        for (total, control_planes) in [(0, 0), (1, 1), (3, 1), (7, 3), (5, 0)] {
            let counter = AggregateCounter::new(cluster(total, control_planes));

            let cp = counter.count_by_predicate(CONTROLPLANES, &cancel).await.unwrap();
            let workers = counter.count_by_predicate(WORKERS, &cancel).await.unwrap();
            let all = counter.count_all(&cancel).await.unwrap();

            assert_eq!(cp, control_planes as i64);
            assert_eq!(workers, (total - control_planes) as i64);
            assert_eq!(cp + workers, all);
        }
    }

    #[tokio::test]
    async fn test_count_all_reads_inventory_every_call() {
        let inventory = cluster(4, 1);
        let counter = AggregateCounter::new(inventory.clone());
        let cancel = CancellationToken::new();

        assert_eq!(counter.count_all(&cancel).await.unwrap(), 4);
        assert_eq!(counter.count_all(&cancel).await.unwrap(), 4);
        assert_eq!(inventory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_label_value_is_ignored() {
        let inventory = Arc::new(StaticInventory {
            nodes: vec![
                node("a", &[(CONTROL_PLANE_LABEL, "true")]),
                node("b", &[(CONTROL_PLANE_LABEL, "")]),
                node("c", &[("node-role.kubernetes.io/worker", "")]),
            ],
            calls: AtomicUsize::new(0),
        });
        let counter = AggregateCounter::new(inventory);
        let cancel = CancellationToken::new();

        assert_eq!(counter.count_by_predicate(CONTROLPLANES, &cancel).await.unwrap(), 2);
        assert_eq!(counter.count_by_predicate(WORKERS, &cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_custom_control_plane_label() {
        let inventory = Arc::new(StaticInventory {
            nodes: vec![
                node("a", &[("node-role.kubernetes.io/master", "")]),
                node("b", &[(CONTROL_PLANE_LABEL, "")]),
            ],
            calls: AtomicUsize::new(0),
        });
        let counter =
            AggregateCounter::new(inventory).with_control_plane_label("node-role.kubernetes.io/master");
        let cancel = CancellationToken::new();

        assert_eq!(counter.count_by_predicate(CONTROLPLANES, &cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_inventory_failure_propagates() {
        let counter = AggregateCounter::new(Arc::new(FailingInventory));
        let cancel = CancellationToken::new();

        match counter.count_all(&cancel).await {
            Err(ProviderError::InventoryUnavailable(message)) => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_query_does_not_wait_for_inventory() {
        let counter = AggregateCounter::new(Arc::new(HungInventory));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = counter.count_by_predicate(WORKERS, &cancel).await;
        assert_eq!(result, Err(ProviderError::Cancelled));
    }
}
