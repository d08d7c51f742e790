//! In-process API server for exercising the kube-backed collaborators

use http::{Request, Response, StatusCode};
use hyper::Body;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

/// How the server answers every request
#[derive(Clone, Copy)]
pub(crate) enum Behavior {
    Serve,
    Fail,
    Hang,
}

/// Path and raw query of a received request
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Received {
    pub path: String,
    pub query: String,
}

/// Serves core group discovery plus canned node and pod lists
#[derive(Clone)]
pub(crate) struct FakeApiServer {
    behavior: Behavior,
    nodes: Vec<Value>,
    pods: Vec<(String, String)>,
    received: Arc<Mutex<Vec<Received>>>,
}

impl FakeApiServer {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            nodes: Vec::new(),
            pods: Vec::new(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_node(mut self, name: &str, labels: &[(&str, &str)]) -> Self {
        let labels: serde_json::Map<String, Value> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        self.nodes.push(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": { "name": name, "labels": labels },
        }));
        self
    }

    pub fn with_pods(mut self, namespace: &str, names: &[&str]) -> Self {
        self.pods
            .extend(names.iter().map(|n| (namespace.to_string(), n.to_string())));
        self
    }

    /// Client whose every request lands on this server
    pub fn client(&self) -> kube::Client {
        let server = self.clone();
        let service = tower::service_fn(move |req: Request<Body>| {
            let server = server.clone();
            async move { server.respond(req).await }
        });
        kube::Client::new(service, "default")
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    async fn respond(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let path = req.uri().path().to_string();
        self.received.lock().unwrap().push(Received {
            path: path.clone(),
            query: req.uri().query().unwrap_or_default().to_string(),
        });

        let (status, body) = match self.behavior {
            Behavior::Hang => return std::future::pending().await,
            Behavior::Fail => (
                StatusCode::INTERNAL_SERVER_ERROR,
                status_body(500, "InternalError", "etcdserver: request timed out"),
            ),
            Behavior::Serve => self.route(&path),
        };

        Ok(Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap())
    }

    fn route(&self, path: &str) -> (StatusCode, Value) {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["api"] => (
                StatusCode::OK,
                json!({
                    "kind": "APIVersions",
                    "versions": ["v1"],
                    "serverAddressByClientCIDRs": [
                        { "clientCIDR": "0.0.0.0/0", "serverAddress": "10.0.0.1:6443" }
                    ],
                }),
            ),
            ["api", "v1"] => (StatusCode::OK, core_resources()),
            ["apis"] => (
                StatusCode::OK,
                json!({ "kind": "APIGroupList", "apiVersion": "v1", "groups": [] }),
            ),
            ["api", "v1", "nodes"] => (StatusCode::OK, list("NodeList", self.nodes.clone())),
            ["api", "v1", "pods"] => (StatusCode::OK, self.pod_list(None)),
            ["api", "v1", "namespaces", namespace, "pods"] => {
                (StatusCode::OK, self.pod_list(Some(*namespace)))
            }
            _ => (
                StatusCode::NOT_FOUND,
                status_body(404, "NotFound", "the server could not find the requested resource"),
            ),
        }
    }

    fn pod_list(&self, namespace: Option<&str>) -> Value {
        let items = self
            .pods
            .iter()
            .filter(|(ns, _)| namespace.map_or(true, |wanted| ns == wanted))
            .map(|(ns, name)| {
                json!({
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": { "name": name, "namespace": ns },
                })
            })
            .collect();
        list("PodList", items)
    }
}

fn core_resources() -> Value {
    json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": "v1",
        "resources": [
            { "name": "nodes", "singularName": "node", "namespaced": false, "kind": "Node", "verbs": ["get", "list"] },
            { "name": "pods", "singularName": "pod", "namespaced": true, "kind": "Pod", "verbs": ["get", "list"] },
            { "name": "pods/log", "singularName": "", "namespaced": true, "kind": "Pod", "verbs": ["get"] },
            { "name": "namespaces", "singularName": "namespace", "namespaced": false, "kind": "Namespace", "verbs": ["get", "list"] },
        ],
    })
}

fn list(kind: &str, items: Vec<Value>) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": { "resourceVersion": "1" },
        "items": items,
    })
}

fn status_body(code: u16, reason: &str, message: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code,
    })
}
