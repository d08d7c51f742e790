//! Core data models for the metrics APIs
//!
//! Wire shapes follow `custom.metrics.k8s.io/v1beta2` and
//! `external.metrics.k8s.io/v1beta1`.

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const CUSTOM_METRICS_GROUP_VERSION: &str = "custom.metrics.k8s.io/v1beta2";
pub const EXTERNAL_METRICS_GROUP_VERSION: &str = "external.metrics.k8s.io/v1beta1";

/// A resource qualified by its API group, e.g. `deployments.apps`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    /// Parse `resource[.group]`
    pub fn parse(value: &str) -> Self {
        match value.split_once('.') {
            Some((resource, group)) => Self {
                group: group.to_string(),
                resource: resource.to_string(),
            },
            None => Self {
                group: String::new(),
                resource: value.to_string(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty() && self.resource.is_empty()
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// Identity of a requested custom metric
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomMetricInfo {
    /// Target resource of the query; empty for catalog entries
    pub group_resource: GroupResource,
    pub metric: String,
    pub namespaced: bool,
}

impl CustomMetricInfo {
    pub fn new(group_resource: GroupResource, metric: impl Into<String>, namespaced: bool) -> Self {
        Self {
            group_resource,
            metric: metric.into(),
            namespaced,
        }
    }
}

/// Identity of a requested external metric
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalMetricInfo {
    pub metric: String,
}

/// Namespace/name pair naming a described object
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Read-only view of a cluster node taken for a single query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl NodeSnapshot {
    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricIdentifier {
    pub name: String,
}

/// A metric value for a single described object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub described_object: ObjectReference,
    pub metric: MetricIdentifier,
    pub timestamp: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    pub value: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValueList {
    pub kind: String,
    pub api_version: String,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<MetricValue>,
}

impl MetricValueList {
    pub fn new(items: Vec<MetricValue>) -> Self {
        Self {
            kind: "MetricValueList".to_string(),
            api_version: CUSTOM_METRICS_GROUP_VERSION.to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

/// A cluster-scoped metric value with no described object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValue {
    pub metric_name: String,
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
    pub timestamp: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    pub value: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValueList {
    pub kind: String,
    pub api_version: String,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<ExternalMetricValue>,
}

impl ExternalMetricValueList {
    pub fn new(items: Vec<ExternalMetricValue>) -> Self {
        Self {
            kind: "ExternalMetricValueList".to_string(),
            api_version: EXTERNAL_METRICS_GROUP_VERSION.to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

/// Discovery entry for one served metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub name: String,
    pub singular_name: String,
    pub namespaced: bool,
    pub kind: String,
    pub verbs: Vec<String>,
}

/// Discovery document listing the served metrics of one API group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    pub kind: String,
    pub api_version: String,
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

impl ApiResourceList {
    pub fn new(group_version: &str, resources: Vec<ApiResource>) -> Self {
        Self {
            kind: "APIResourceList".to_string(),
            api_version: "v1".to_string(),
            group_version: group_version.to_string(),
            resources,
        }
    }
}
