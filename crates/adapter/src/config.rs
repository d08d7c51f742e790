//! Adapter configuration

use adapter_lib::counter::CONTROL_PLANE_LABEL;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Adapter configuration, read from `ADAPTER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Pod name from the Kubernetes downward API
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port serving the metrics APIs, health and self-metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Message logged on startup
    #[serde(default = "default_message")]
    pub message: String,

    /// Label whose presence marks a control-plane node
    #[serde(default = "default_control_plane_label")]
    pub control_plane_label: String,

    /// Deadline for a single metrics query in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "cluster-metrics-adapter".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_message() -> String {
    "starting adapter...".to_string()
}

fn default_control_plane_label() -> String {
    CONTROL_PLANE_LABEL.to_string()
}

fn default_query_timeout() -> u64 {
    30
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            api_port: default_api_port(),
            message: default_message(),
            control_plane_label: default_control_plane_label(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl AdapterConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("ADAPTER"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder().add_source(source).build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("ADAPTER").source(Some(source))
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AdapterConfig::from_source(environment(&[])).unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.message, "starting adapter...");
        assert_eq!(config.control_plane_label, CONTROL_PLANE_LABEL);
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = AdapterConfig::from_source(environment(&[
            ("ADAPTER_API_PORT", "6443"),
            ("ADAPTER_CONTROL_PLANE_LABEL", "node-role.kubernetes.io/master"),
            ("ADAPTER_QUERY_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 6443);
        assert_eq!(config.control_plane_label, "node-role.kubernetes.io/master");
        assert_eq!(config.query_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let result = AdapterConfig::from_source(environment(&[("ADAPTER_API_PORT", "not-a-port")]));
        assert!(result.is_err());
    }
}
