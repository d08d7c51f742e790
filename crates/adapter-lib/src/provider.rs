//! Custom and external metrics providers
//!
//! `ClusterProvider` answers both API groups from the node inventory:
//! - name queries report the total node count for the described object
//! - selector queries split the total node count across matched objects
//! - external queries count nodes with or without the control-plane label

use crate::apportion::apportion;
use crate::builder::{build_external, build_named};
use crate::cancel::run_cancellable;
use crate::catalog;
use crate::counter::AggregateCounter;
use crate::error::{ProviderError, Result};
use crate::inventory::NodeInventory;
use crate::models::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValueList, MetricValue, MetricValueList,
    NamespacedName,
};
use crate::observability::{AdapterMetrics, StructuredLogger};
use crate::resolver::ObjectResolver;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Provider for `custom.metrics.k8s.io`
#[async_trait]
pub trait CustomMetricsProvider: Send + Sync {
    fn list_all_metrics(&self) -> Vec<CustomMetricInfo>;

    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<MetricValue>;

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        selector: &str,
        info: &CustomMetricInfo,
        metric_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<MetricValueList>;
}

/// Provider for `external.metrics.k8s.io`
#[async_trait]
pub trait ExternalMetricsProvider: Send + Sync {
    fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo>;

    async fn get_external_metric(
        &self,
        namespace: &str,
        metric_selector: &str,
        info: &ExternalMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<ExternalMetricValueList>;
}

/// Answers node-derived metrics; holds no per-query state
#[derive(Clone)]
pub struct ClusterProvider {
    counter: AggregateCounter,
    resolver: Arc<dyn ObjectResolver>,
    metrics: AdapterMetrics,
    logger: StructuredLogger,
}

impl ClusterProvider {
    pub fn new(inventory: Arc<dyn NodeInventory>, resolver: Arc<dyn ObjectResolver>) -> Self {
        Self {
            counter: AggregateCounter::new(inventory),
            resolver,
            metrics: AdapterMetrics::new(),
            logger: StructuredLogger::new("cluster-metrics-adapter"),
        }
    }

    pub fn with_control_plane_label(mut self, label: impl Into<String>) -> Self {
        self.counter = self.counter.with_control_plane_label(label);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    fn ensure_known(metric: &str) -> Result<()> {
        catalog::lookup(metric)
            .map(|_| ())
            .ok_or_else(|| ProviderError::MetricNotFound(metric.to_string()))
    }

    /// Resolve the described object and build its value
    async fn metric_for(
        &self,
        value: i64,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<MetricValue> {
        let reference = run_cancellable(cancel, async {
            self.resolver
                .resolve_reference(name, info, cancel)
                .await
                .map_err(|e| resolution_failed(info, format!("{:#}", e)))
        })
        .await?;

        Ok(build_named(value, name, reference, info))
    }

    /// Time, count and log one query
    async fn instrumented<T, F>(
        &self,
        operation: &'static str,
        metric: &str,
        items: fn(&T) -> usize,
        query: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = query.await;
        let elapsed = start.elapsed().as_secs_f64();

        self.metrics.observe_query_latency(operation, elapsed);
        match &result {
            Ok(value) => self.logger.log_query(operation, metric, items(value), elapsed),
            Err(e) => {
                self.metrics.inc_query_errors(operation, e.kind());
                self.logger.log_query_failed(operation, metric, e);
            }
        }

        result
    }
}

#[async_trait]
impl CustomMetricsProvider for ClusterProvider {
    fn list_all_metrics(&self) -> Vec<CustomMetricInfo> {
        catalog::list_all_metrics()
    }

    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<MetricValue> {
        debug!(object = %name, metric_selector = %metric_selector, "Metric selector ignored");

        self.instrumented(
            "get_metric_by_name",
            &info.metric,
            |_: &MetricValue| 1,
            self.metric_by_name(name, info, cancel),
        )
        .await
    }

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        selector: &str,
        info: &CustomMetricInfo,
        metric_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<MetricValueList> {
        debug!(selector = %selector, metric_selector = %metric_selector, "Metric selector ignored");

        self.instrumented(
            "get_metric_by_selector",
            &info.metric,
            |list: &MetricValueList| list.items.len(),
            self.metric_by_selector(namespace, selector, info, cancel),
        )
        .await
    }
}

#[async_trait]
impl ExternalMetricsProvider for ClusterProvider {
    fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo> {
        catalog::list_all_external_metrics()
    }

    async fn get_external_metric(
        &self,
        namespace: &str,
        metric_selector: &str,
        info: &ExternalMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<ExternalMetricValueList> {
        debug!(namespace = %namespace, metric_selector = %metric_selector, "Namespace and metric selector ignored");

        self.instrumented(
            "get_external_metric",
            &info.metric,
            |list: &ExternalMetricValueList| list.items.len(),
            self.external_metric(info, cancel),
        )
        .await
    }
}

impl ClusterProvider {
    async fn metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<MetricValue> {
        Self::ensure_known(&info.metric)?;

        let total = self.counter.count_all(cancel).await?;
        self.metric_for(total, name, info, cancel).await
    }

    async fn metric_by_selector(
        &self,
        namespace: &str,
        selector: &str,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<MetricValueList> {
        Self::ensure_known(&info.metric)?;

        let total = self.counter.count_all(cancel).await?;

        let names = run_cancellable(cancel, async {
            self.resolver
                .enumerate_names(namespace, selector, info, cancel)
                .await
                .map_err(|e| ProviderError::EnumerationFailed {
                    resource: info.group_resource.to_string(),
                    message: format!("{:#}", e),
                })
        })
        .await?;

        let shares = apportion(total, names)?;
        let targets: Vec<NamespacedName> = shares
            .iter()
            .map(|(name, _)| NamespacedName::new(namespace, name.as_str()))
            .collect();

        let references = run_cancellable(cancel, async {
            self.resolver
                .resolve_references(&targets, info, cancel)
                .await
                .map_err(|e| resolution_failed(info, format!("{:#}", e)))
        })
        .await?;

        if references.len() != targets.len() {
            return Err(resolution_failed(
                info,
                format!(
                    "resolved {} references for {} objects",
                    references.len(),
                    targets.len()
                ),
            ));
        }

        let items = shares
            .into_iter()
            .zip(targets.iter())
            .zip(references)
            .map(|(((_, share), name), reference)| build_named(share, name, reference, info))
            .collect();

        Ok(MetricValueList::new(items))
    }

    async fn external_metric(
        &self,
        info: &ExternalMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<ExternalMetricValueList> {
        Self::ensure_known(&info.metric)?;

        let count = self.counter.count_by_predicate(&info.metric, cancel).await?;
        Ok(ExternalMetricValueList::new(vec![build_external(count, info)]))
    }
}

fn resolution_failed(info: &CustomMetricInfo, message: String) -> ProviderError {
    ProviderError::ReferenceResolutionFailed {
        resource: info.group_resource.to_string(),
        message,
    }
}
