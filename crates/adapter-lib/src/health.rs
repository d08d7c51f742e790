//! Health tracking for the adapter's collaborators
//!
//! Collaborator health is inferred from query outcomes: a failed node
//! listing marks the inventory unhealthy, a failed object lookup marks the
//! resolver degraded, and the next successful query restores them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Some queries fail but others are still served
    Degraded,
    /// No query can be served
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut status = ComponentStatus::Healthy;
        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => status = ComponentStatus::Degraded,
                ComponentStatus::Healthy => {}
            }
        }
        status
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const NODE_INVENTORY: &str = "node_inventory";
    pub const OBJECT_RESOLVER: &str = "object_resolver";
}

#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_healthy(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::new(status, message));
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Readiness only reflects bootstrap. Collaborator failures stay visible
    /// on `/healthz` so the adapter keeps receiving the queries that heal them.
    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.ready.read().await {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Adapter not yet initialized".to_string()),
            }
        }
    }
}
