//! Mapping of metric targets to Kubernetes objects
//!
//! Uses API discovery to find the kind behind a metric's group resource
//! and dynamic listing to enumerate objects matching a label selector.

use crate::models::{CustomMetricInfo, GroupResource, NamespacedName};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolves described objects for per-object metric queries
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    /// Build a reference to `name`, typed by the metric's target resource
    async fn resolve_reference(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<ObjectReference>;

    /// References for every name in `names`, in order, all of the metric's
    /// target resource
    async fn resolve_references(
        &self,
        names: &[NamespacedName],
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectReference>> {
        let mut references = Vec::with_capacity(names.len());
        for name in names {
            references.push(self.resolve_reference(name, info, cancel).await?);
        }
        Ok(references)
    }

    /// Names of target objects matching `selector`. An empty list is valid.
    async fn enumerate_names(
        &self,
        namespace: &str,
        selector: &str,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>>;
}

/// Resolver backed by API discovery and the dynamic client
#[derive(Clone)]
pub struct KubeObjectResolver {
    client: kube::Client,
}

impl KubeObjectResolver {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Find the preferred API resource serving `group_resource`
    async fn discover(&self, group_resource: &GroupResource) -> Result<ApiResource> {
        let group = kube::discovery::group(&self.client, &group_resource.group)
            .await
            .with_context(|| format!("Failed to discover API group {:?}", group_resource.group))?;

        group
            .recommended_resources()
            .into_iter()
            .map(|(resource, _)| resource)
            .find(|resource| resource.plural == group_resource.resource)
            .with_context(|| format!("No kind registered for resource {}", group_resource))
    }
}

/// Object reference for `name` as an instance of `resource`; cluster-scoped
/// names carry no namespace
pub fn reference_for(resource: &ApiResource, name: &NamespacedName) -> ObjectReference {
    ObjectReference {
        api_version: Some(resource.api_version.clone()),
        kind: Some(resource.kind.clone()),
        name: Some(name.name.clone()),
        namespace: (!name.namespace.is_empty()).then(|| name.namespace.clone()),
        ..Default::default()
    }
}

#[async_trait]
impl ObjectResolver for KubeObjectResolver {
    async fn resolve_reference(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<ObjectReference> {
        let resource = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("reference resolution cancelled"),
            resource = self.discover(&info.group_resource) => resource?,
        };

        Ok(reference_for(&resource, name))
    }

    async fn resolve_references(
        &self,
        names: &[NamespacedName],
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectReference>> {
        let resource = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("reference resolution cancelled"),
            resource = self.discover(&info.group_resource) => resource?,
        };

        Ok(names.iter().map(|name| reference_for(&resource, name)).collect())
    }

    async fn enumerate_names(
        &self,
        namespace: &str,
        selector: &str,
        info: &CustomMetricInfo,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let listing = async {
            let resource = self.discover(&info.group_resource).await?;
            let api: Api<DynamicObject> = if info.namespaced {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            } else {
                Api::all_with(self.client.clone(), &resource)
            };

            let mut params = ListParams::default();
            if !selector.is_empty() {
                params = params.labels(selector);
            }

            api.list(&params)
                .await
                .with_context(|| format!("Failed to list {}", info.group_resource))
        };

        let list = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("object listing cancelled"),
            list = listing => list?,
        };

        debug!(
            resource = %info.group_resource,
            namespace = %namespace,
            selector = %selector,
            "Found {} matching objects",
            list.items.len()
        );

        Ok(list.items.iter().map(|obj| obj.name_any()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_apiserver::{Behavior, FakeApiServer};
    use std::time::Duration;

    fn pods(namespaced: bool) -> CustomMetricInfo {
        CustomMetricInfo::new(GroupResource::parse("pods"), "workers", namespaced)
    }

    fn web_pods() -> FakeApiServer {
        FakeApiServer::new(Behavior::Serve)
            .with_pods("ns", &["pod1", "pod2"])
            .with_pods("other", &["pod3"])
    }

    #[test]
    fn test_reference_for_core_resource() {
        let pods = ApiResource {
            group: String::new(),
            version: "v1".to_string(),
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            plural: "pods".to_string(),
        };

        let reference = reference_for(&pods, &NamespacedName::new("default", "pod1"));

        assert_eq!(reference.api_version.as_deref(), Some("v1"));
        assert_eq!(reference.kind.as_deref(), Some("Pod"));
        assert_eq!(reference.name.as_deref(), Some("pod1"));
        assert_eq!(reference.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_reference_for_grouped_resource() {
        let deployments = ApiResource {
            group: "apps".to_string(),
            version: "v1".to_string(),
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            plural: "deployments".to_string(),
        };

        let reference = reference_for(&deployments, &NamespacedName::new("", "web"));

        assert_eq!(reference.api_version.as_deref(), Some("apps/v1"));
        assert_eq!(reference.kind.as_deref(), Some("Deployment"));
        assert!(reference.namespace.is_none());
    }

    #[tokio::test]
    async fn test_resolve_reference_discovers_kind() {
        let server = web_pods();
        let resolver = KubeObjectResolver::new(server.client());

        let reference = resolver
            .resolve_reference(
                &NamespacedName::new("ns", "pod1"),
                &pods(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(reference.api_version.as_deref(), Some("v1"));
        assert_eq!(reference.kind.as_deref(), Some("Pod"));
        assert_eq!(reference.name.as_deref(), Some("pod1"));
        assert_eq!(reference.namespace.as_deref(), Some("ns"));
    }

    #[tokio::test]
    async fn test_unmapped_resource_fails() {
        let server = web_pods();
        let resolver = KubeObjectResolver::new(server.client());
        let cancel = CancellationToken::new();
        let name = NamespacedName::new("ns", "w1");

        let unknown_core = CustomMetricInfo::new(GroupResource::parse("widgets"), "workers", true);
        let err = resolver
            .resolve_reference(&name, &unknown_core, &cancel)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("No kind registered for resource widgets"));

        let unknown_group =
            CustomMetricInfo::new(GroupResource::parse("widgets.example.com"), "workers", true);
        let err = resolver
            .enumerate_names("ns", "", &unknown_group, &cancel)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("example.com"));
    }

    #[tokio::test]
    async fn test_resolve_references_discovers_once() {
        let server = web_pods();
        let resolver = KubeObjectResolver::new(server.client());
        let names: Vec<NamespacedName> = (0..20)
            .map(|i| NamespacedName::new("ns", format!("pod{}", i)))
            .collect();

        let references = resolver
            .resolve_references(&names, &pods(true), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(references.len(), 20);
        assert_eq!(references[7].name.as_deref(), Some("pod7"));
        assert!(references.iter().all(|r| r.kind.as_deref() == Some("Pod")));

        let paths: Vec<String> = server.received().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/api", "/api/v1"]);
    }

    #[tokio::test]
    async fn test_enumerate_namespaced_lists_within_namespace() {
        let server = web_pods();
        let resolver = KubeObjectResolver::new(server.client());

        let names = resolver
            .enumerate_names("ns", "app=web", &pods(true), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(names, vec!["pod1", "pod2"]);

        let listing = server.received().pop().unwrap();
        assert_eq!(listing.path, "/api/v1/namespaces/ns/pods");
        assert!(listing.query.contains("labelSelector=app%3Dweb"));
    }

    #[tokio::test]
    async fn test_enumerate_root_scoped_lists_cluster_wide() {
        let server = web_pods();
        let resolver = KubeObjectResolver::new(server.client());

        let names = resolver
            .enumerate_names("", "", &pods(false), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(names, vec!["pod1", "pod2", "pod3"]);

        let listing = server.received().pop().unwrap();
        assert_eq!(listing.path, "/api/v1/pods");
        assert!(!listing.query.contains("labelSelector"));
    }

    #[tokio::test]
    async fn test_enumerate_gives_up_when_cancelled() {
        let server = FakeApiServer::new(Behavior::Hang);
        let resolver = KubeObjectResolver::new(server.client());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            resolver.enumerate_names("ns", "", &pods(true), &cancel),
        )
        .await
        .expect("enumeration did not observe cancellation");

        assert!(result.unwrap_err().to_string().contains("cancelled"));
    }
}
