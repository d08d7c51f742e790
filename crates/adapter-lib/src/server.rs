//! HTTP API: custom/external metrics endpoints, health and self-metrics

use crate::error::ProviderError;
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{
    ApiResource, ApiResourceList, CustomMetricInfo, ExternalMetricInfo, ExternalMetricValueList,
    GroupResource, MetricValueList, NamespacedName, CUSTOM_METRICS_GROUP_VERSION,
    EXTERNAL_METRICS_GROUP_VERSION,
};
use crate::provider::{ClusterProvider, CustomMetricsProvider, ExternalMetricsProvider};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;

/// Object name that switches an object query to a selector query
const ALL_OBJECTS: &str = "*";

/// Resource described by `/namespaces/{namespace}/metrics/{metric}`
const NAMESPACES: &str = "namespaces";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ClusterProvider>,
    pub health_registry: HealthRegistry,
    pub query_timeout: Duration,
}

impl AppState {
    pub fn new(
        provider: Arc<ClusterProvider>,
        health_registry: HealthRegistry,
        query_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            health_registry,
            query_timeout,
        }
    }

    /// Reflect a query outcome in collaborator health
    async fn record_outcome<T>(&self, result: &Result<T, ProviderError>, used_resolver: bool) {
        match result {
            Ok(_) => {
                self.health_registry
                    .set_healthy(components::NODE_INVENTORY)
                    .await;
                if used_resolver {
                    self.health_registry
                        .set_healthy(components::OBJECT_RESOLVER)
                        .await;
                }
            }
            Err(ProviderError::InventoryUnavailable(message)) => {
                self.health_registry
                    .set_unhealthy(components::NODE_INVENTORY, message.clone())
                    .await;
            }
            Err(
                e @ (ProviderError::ReferenceResolutionFailed { .. }
                | ProviderError::EnumerationFailed { .. }),
            ) => {
                self.health_registry
                    .set_degraded(components::OBJECT_RESOLVER, e.to_string())
                    .await;
            }
            Err(_) => {}
        }
    }
}

/// Cancellation token for one request.
///
/// Fires when the query timeout elapses or when the handler future is
/// dropped because the client went away.
struct QueryDeadline {
    token: CancellationToken,
    _guard: DropGuard,
}

impl QueryDeadline {
    fn start(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let timer = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => timer.cancel(),
                _ = timer.cancelled() => {}
            }
        });

        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }
}

/// Kubernetes `Status` body for failed requests
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub kind: String,
    pub api_version: String,
    pub status: String,
    pub message: String,
    pub reason: String,
    pub code: u16,
}

/// Provider error rendered as a Kubernetes `Status`
pub struct ApiError(pub ProviderError);

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, reason) = match &self.0 {
            ProviderError::MetricNotFound(_) | ProviderError::NoMatchingObjects => {
                (StatusCode::NOT_FOUND, "NotFound")
            }
            ProviderError::InventoryUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable")
            }
            ProviderError::Cancelled => (StatusCode::GATEWAY_TIMEOUT, "Timeout"),
            ProviderError::ReferenceResolutionFailed { .. }
            | ProviderError::EnumerationFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        };

        let body = Status {
            kind: "Status".to_string(),
            api_version: "v1".to_string(),
            status: "Failure".to_string(),
            message: self.0.to_string(),
            reason: reason.to_string(),
            code: code.as_u16(),
        };

        (code, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectQuery {
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default)]
    pub metric_label_selector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalQuery {
    #[serde(default)]
    pub metric_label_selector: Option<String>,
}

/// Health check - 200 unless the node inventory is failing
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn list_custom_metrics(State(state): State<Arc<AppState>>) -> Json<ApiResourceList> {
    let resources = state
        .provider
        .list_all_metrics()
        .into_iter()
        .map(|info| metric_resource(info.metric, info.namespaced, "MetricValueList"))
        .collect();

    Json(ApiResourceList::new(CUSTOM_METRICS_GROUP_VERSION, resources))
}

async fn list_external_metrics(State(state): State<Arc<AppState>>) -> Json<ApiResourceList> {
    let resources = state
        .provider
        .list_all_external_metrics()
        .into_iter()
        .map(|info| metric_resource(info.metric, true, "ExternalMetricValueList"))
        .collect();

    Json(ApiResourceList::new(EXTERNAL_METRICS_GROUP_VERSION, resources))
}

fn metric_resource(name: String, namespaced: bool, kind: &str) -> ApiResource {
    ApiResource {
        name,
        singular_name: String::new(),
        namespaced,
        kind: kind.to_string(),
        verbs: vec!["get".to_string()],
    }
}

async fn root_object_metric(
    State(state): State<Arc<AppState>>,
    Path((resource, name, metric)): Path<(String, String, String)>,
    Query(query): Query<ObjectQuery>,
) -> Result<Json<MetricValueList>, ApiError> {
    object_metric(&state, None, &resource, &name, metric, query).await
}

async fn namespaced_object_metric(
    State(state): State<Arc<AppState>>,
    Path((namespace, resource, name, metric)): Path<(String, String, String, String)>,
    Query(query): Query<ObjectQuery>,
) -> Result<Json<MetricValueList>, ApiError> {
    object_metric(&state, Some(namespace), &resource, &name, metric, query).await
}

/// Metric describing a namespace object itself
async fn namespace_metric(
    State(state): State<Arc<AppState>>,
    Path((namespace, metric)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
) -> Result<Json<MetricValueList>, ApiError> {
    object_metric(&state, None, NAMESPACES, &namespace, metric, query).await
}

async fn object_metric(
    state: &AppState,
    namespace: Option<String>,
    resource: &str,
    name: &str,
    metric: String,
    query: ObjectQuery,
) -> Result<Json<MetricValueList>, ApiError> {
    let info = CustomMetricInfo::new(GroupResource::parse(resource), metric, namespace.is_some());
    let namespace = namespace.unwrap_or_default();
    let metric_selector = query.metric_label_selector.unwrap_or_default();
    let deadline = QueryDeadline::start(state.query_timeout);

    let result = if name == ALL_OBJECTS {
        let selector = query.label_selector.unwrap_or_default();
        state
            .provider
            .get_metric_by_selector(&namespace, &selector, &info, &metric_selector, &deadline.token)
            .await
    } else {
        let name = NamespacedName::new(namespace, name);
        state
            .provider
            .get_metric_by_name(&name, &info, &metric_selector, &deadline.token)
            .await
            .map(|value| MetricValueList::new(vec![value]))
    };

    state.record_outcome(&result, true).await;
    Ok(Json(result?))
}

async fn external_metric(
    State(state): State<Arc<AppState>>,
    Path((namespace, metric)): Path<(String, String)>,
    Query(query): Query<ExternalQuery>,
) -> Result<Json<ExternalMetricValueList>, ApiError> {
    let info = ExternalMetricInfo { metric };
    let metric_selector = query.metric_label_selector.unwrap_or_default();
    let deadline = QueryDeadline::start(state.query_timeout);

    let result = state
        .provider
        .get_external_metric(&namespace, &metric_selector, &info, &deadline.token)
        .await;

    state.record_outcome(&result, false).await;
    Ok(Json(result?))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let custom = "/apis/custom.metrics.k8s.io/v1beta2";
    let external = "/apis/external.metrics.k8s.io/v1beta1";

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route(custom, get(list_custom_metrics))
        .route(
            &format!("{}/namespaces/:namespace/metrics/:metric", custom),
            get(namespace_metric),
        )
        .route(
            &format!("{}/namespaces/:namespace/:resource/:name/:metric", custom),
            get(namespaced_object_metric),
        )
        .route(
            &format!("{}/:resource/:name/:metric", custom),
            get(root_object_metric),
        )
        .route(external, get(list_external_metrics))
        .route(
            &format!("{}/namespaces/:namespace/:metric", external),
            get(external_metric),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
