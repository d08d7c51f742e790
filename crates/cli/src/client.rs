//! HTTP client for the metrics adapter API

use adapter_lib::{ApiResourceList, ExternalMetricValueList, MetricValueList};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

const CUSTOM_METRICS_PATH: &str = "apis/custom.metrics.k8s.io/v1beta2";
const EXTERNAL_METRICS_PATH: &str = "apis/external.metrics.k8s.io/v1beta1";

/// Failure body returned by the adapter
#[derive(Debug, Deserialize)]
struct Status {
    message: String,
    #[serde(default)]
    reason: String,
}

/// API client for the metrics adapter
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request with optional query parameters
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<Status>(&body) {
                Ok(failure) if !failure.reason.is_empty() => {
                    anyhow::bail!("API error ({}, {}): {}", status, failure.reason, failure.message)
                }
                Ok(failure) => anyhow::bail!("API error ({}): {}", status, failure.message),
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn custom_metrics(&self) -> Result<ApiResourceList> {
        self.get(CUSTOM_METRICS_PATH, &[]).await
    }

    pub async fn external_metrics(&self) -> Result<ApiResourceList> {
        self.get(EXTERNAL_METRICS_PATH, &[]).await
    }

    /// Query the metric of one object, or of every object matching `selector`
    /// when `name` is `*`
    pub async fn object_metric(
        &self,
        namespace: Option<&str>,
        resource: &str,
        name: &str,
        metric: &str,
        selector: Option<&str>,
    ) -> Result<MetricValueList> {
        let path = match namespace {
            Some(ns) => format!(
                "{}/namespaces/{}/{}/{}/{}",
                CUSTOM_METRICS_PATH, ns, resource, name, metric
            ),
            None => format!("{}/{}/{}/{}", CUSTOM_METRICS_PATH, resource, name, metric),
        };

        match selector {
            Some(selector) => self.get(&path, &[("labelSelector", selector)]).await,
            None => self.get(&path, &[]).await,
        }
    }

    pub async fn external_metric(&self, namespace: &str, metric: &str) -> Result<ExternalMetricValueList> {
        let path = format!("{}/namespaces/{}/{}", EXTERNAL_METRICS_PATH, namespace, metric);
        self.get(&path, &[]).await
    }
}
