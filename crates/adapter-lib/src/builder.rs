//! Construction of the values returned to API clients
//!
//! Per-object values are scaled by 100 and expressed in milli-units, while
//! external values are plain counts. Autoscaler targets are written against
//! these two conventions, so they must not be unified.

use crate::models::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValue, MetricIdentifier, MetricValue,
    NamespacedName,
};
use crate::quantity;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::BTreeMap;

/// Value describing a single object; the timestamp is construction time
pub fn build_named(
    value: i64,
    name: &NamespacedName,
    reference: ObjectReference,
    info: &CustomMetricInfo,
) -> MetricValue {
    let mut described_object = reference;
    if described_object.name.is_none() {
        described_object.name = Some(name.name.clone());
    }
    if described_object.namespace.is_none() && !name.namespace.is_empty() {
        described_object.namespace = Some(name.namespace.clone());
    }

    MetricValue {
        described_object,
        metric: MetricIdentifier {
            name: info.metric.clone(),
        },
        timestamp: Time(chrono::Utc::now()),
        window_seconds: None,
        value: quantity::milli_decimal_si(value.saturating_mul(100)),
    }
}

/// Cluster-scoped value, unscaled
pub fn build_external(value: i64, info: &ExternalMetricInfo) -> ExternalMetricValue {
    ExternalMetricValue {
        metric_name: info.metric.clone(),
        metric_labels: BTreeMap::new(),
        timestamp: Time(chrono::Utc::now()),
        window_seconds: None,
        value: quantity::decimal_si(value),
    }
}
