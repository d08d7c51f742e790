//! Fixed catalog of the metrics served by the adapter

use crate::models::{CustomMetricInfo, ExternalMetricInfo, GroupResource};

/// Number of nodes carrying the control-plane role label
pub const CONTROLPLANES: &str = "controlplanes";

/// Number of nodes without the control-plane role label
pub const WORKERS: &str = "workers";

static METRIC_NAMES: [&str; 2] = [CONTROLPLANES, WORKERS];

/// All custom metrics, in catalog order. Neither metric is namespaced.
pub fn list_all_metrics() -> Vec<CustomMetricInfo> {
    METRIC_NAMES
        .iter()
        .map(|name| CustomMetricInfo::new(GroupResource::default(), *name, false))
        .collect()
}

/// All external metrics, in catalog order
pub fn list_all_external_metrics() -> Vec<ExternalMetricInfo> {
    METRIC_NAMES
        .iter()
        .map(|name| ExternalMetricInfo {
            metric: name.to_string(),
        })
        .collect()
}

/// Look up a metric name in the catalog
pub fn lookup(name: &str) -> Option<&'static str> {
    METRIC_NAMES.iter().copied().find(|known| *known == name)
}
