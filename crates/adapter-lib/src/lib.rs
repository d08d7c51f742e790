//! Node-derived custom and external metrics for Kubernetes autoscalers
//!
//! This crate provides:
//! - A fixed catalog of cluster metrics (`controlplanes`, `workers`)
//! - Node counting and apportionment of the count across selected objects
//! - Custom and external metrics providers with cancellable queries
//! - The HTTP API serving both metrics groups, health checks and self-metrics

pub mod apportion;
pub mod builder;
mod cancel;
pub mod catalog;
pub mod counter;
pub mod error;
#[cfg(test)]
mod fake_apiserver;
pub mod health;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod provider;
pub mod quantity;
pub mod resolver;
pub mod server;

pub use error::{ProviderError, Result};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use inventory::{KubeNodeInventory, NodeInventory};
pub use models::*;
pub use observability::{AdapterMetrics, StructuredLogger};
pub use provider::{ClusterProvider, CustomMetricsProvider, ExternalMetricsProvider};
pub use resolver::{KubeObjectResolver, ObjectResolver};
