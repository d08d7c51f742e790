//! Metric catalog and query commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_quantity, print_header, print_rows, OutputFormat};
use adapter_lib::{ExternalMetricValueList, MetricValueList};

/// Row for the metric catalog table
#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "API")]
    api: String,
    #[tabled(rename = "Namespaced")]
    namespaced: bool,
}

/// Row for per-object metric values
#[derive(Tabled)]
struct ObjectValueRow {
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Raw")]
    raw: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

/// Row for external metric values
#[derive(Tabled)]
struct ExternalValueRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

/// List the custom and external metric catalogs
pub async fn list_metrics(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let custom = client.custom_metrics().await?;
    let external = client.external_metrics().await?;

    let rows: Vec<CatalogRow> = custom
        .resources
        .iter()
        .map(|r| CatalogRow {
            metric: r.name.clone(),
            api: custom.group_version.clone(),
            namespaced: r.namespaced,
        })
        .chain(external.resources.iter().map(|r| CatalogRow {
            metric: r.name.clone(),
            api: external.group_version.clone(),
            namespaced: r.namespaced,
        }))
        .collect();

    print_rows(&rows, &[custom, external], format)
}

/// Show a single object's metric
pub async fn get_object_metric(
    client: &ApiClient,
    namespace: Option<String>,
    resource: &str,
    name: &str,
    metric: &str,
    format: OutputFormat,
) -> Result<()> {
    let list = client
        .object_metric(namespace.as_deref(), resource, name, metric, None)
        .await?;
    print_metric_values(&list, format)
}

/// Show the metric of every object matching a selector
pub async fn get_selector_metric(
    client: &ApiClient,
    namespace: Option<String>,
    resource: &str,
    metric: &str,
    selector: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let selector = selector.unwrap_or_default();
    let list = client
        .object_metric(namespace.as_deref(), resource, "*", metric, Some(&selector))
        .await?;

    if let OutputFormat::Table = format {
        print_header(&format!("{} objects of {}", list.items.len(), resource));
    }
    print_metric_values(&list, format)
}

/// Show a cluster-scoped external metric
pub async fn get_external_metric(
    client: &ApiClient,
    namespace: &str,
    metric: &str,
    format: OutputFormat,
) -> Result<()> {
    let list = client.external_metric(namespace, metric).await?;
    print_external_values(&list, format)
}

fn print_metric_values(list: &MetricValueList, format: OutputFormat) -> Result<()> {
    let rows: Vec<ObjectValueRow> = list
        .items
        .iter()
        .map(|item| {
            let object = &item.described_object;
            let name = object.name.clone().unwrap_or_default();
            let object = match (&object.kind, &object.namespace) {
                (Some(kind), Some(ns)) => format!("{}/{}/{}", kind, ns, name),
                (Some(kind), None) => format!("{}/{}", kind, name),
                (None, _) => name,
            };
            ObjectValueRow {
                object,
                metric: item.metric.name.clone(),
                value: format_quantity(&item.value),
                raw: item.value.0.clone(),
                timestamp: item.timestamp.0.to_rfc3339(),
            }
        })
        .collect();

    print_rows(&rows, list, format)
}

fn print_external_values(list: &ExternalMetricValueList, format: OutputFormat) -> Result<()> {
    let rows: Vec<ExternalValueRow> = list
        .items
        .iter()
        .map(|item| ExternalValueRow {
            metric: item.metric_name.clone(),
            value: format_quantity(&item.value),
            timestamp: item.timestamp.0.to_rfc3339(),
        })
        .collect();

    print_rows(&rows, list, format)
}
