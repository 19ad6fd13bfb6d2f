#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A [`DiscoveryClient`] that reaches control plane replicas through the
//! Kubernetes API.
//!
//! Replica pods are discovered with a label selector and each one is queried
//! over a port-forward to its debug port.

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use futures::future;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use istio_proxy_status_core::{DiscoveryClient, Responses};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, Portforwarder, ResourceExt};
use tokio::time;
use tracing::{debug, info_span, Instrument};

pub const DEFAULT_SELECTOR: &str = "app=istiod";
pub const DEFAULT_DEBUG_PORT: u16 = 15014;

const REVISION_LABEL: &str = "istio.io/rev";
const RUNNING: &str = "status.phase=Running";

const PORT_FORWARD_ATTEMPTS: usize = 3;
const PORT_FORWARD_BACKOFF: time::Duration = time::Duration::from_secs(1);

#[derive(Clone)]
pub struct KubeDiscovery {
    client: kube::Client,
    selector: String,
    revision: Option<String>,
    port: u16,
}

// === impl KubeDiscovery ===

impl KubeDiscovery {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            selector: DEFAULT_SELECTOR.to_string(),
            revision: None,
            port: DEFAULT_DEBUG_PORT,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision.filter(|r| !r.is_empty());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn list_params(&self) -> ListParams {
        let revision = self
            .revision
            .as_deref()
            .map(|rev| format!("{REVISION_LABEL}={rev}"));
        let labels = std::iter::once(self.selector.as_str())
            .chain(revision.as_deref())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        ListParams::default().labels(&labels).fields(RUNNING)
    }

    async fn get(&self, api: &Api<Pod>, pod: &str, path: &str) -> Result<Bytes> {
        let port = self.port;
        let mut pf = port_forward(api, pod, port).await?;
        let io = pf
            .take_stream(port)
            .ok_or_else(|| anyhow!("port-forward to {pod}:{port} has no stream"))?;

        let (mut tx, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
            .await
            .with_context(|| format!("failed to connect to {pod}:{port}"))?;
        tokio::spawn(
            async move {
                if let Err(error) = conn.await {
                    debug!(%error, "Connection closed");
                }
            }
            .in_current_span(),
        );

        let req = hyper::Request::get(path)
            .header(hyper::header::HOST, "localhost")
            .body(Empty::<Bytes>::new())?;
        let rsp = tx
            .send_request(req)
            .await
            .with_context(|| format!("GET {path} on {pod} failed"))?;
        let status = rsp.status();
        let body = rsp
            .into_body()
            .collect()
            .await
            .with_context(|| format!("failed to read response from {pod}"))?
            .to_bytes();
        pf.abort();

        let body = check_status(pod, path, status, body)?;
        debug!(%status, bytes = body.len(), "Response");
        Ok(body)
    }
}

fn check_status(pod: &str, path: &str, status: hyper::StatusCode, body: Bytes) -> Result<Bytes> {
    if !status.is_success() {
        bail!(
            "{pod} returned {status} for {path}: {}",
            String::from_utf8_lossy(&body)
        );
    }
    Ok(body)
}

#[async_trait::async_trait]
impl DiscoveryClient for KubeDiscovery {
    async fn all_discovery_do(&self, namespace: &str, path: &str) -> Result<Responses> {
        let api = Api::<Pod>::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&self.list_params())
            .await
            .with_context(|| format!("failed to list control plane pods in {namespace}"))?;
        if pods.items.is_empty() {
            bail!("unable to find any control plane instances in {namespace}");
        }
        debug!(%namespace, replicas = pods.items.len(), "Discovered control plane");

        let rsps = future::try_join_all(pods.items.iter().map(|pod| {
            let name = pod.name_any();
            let span = info_span!("replica", pod = %name);
            let api = &api;
            async move {
                let body = self.get(api, &name, path).await?;
                Ok::<_, anyhow::Error>((name, body))
            }
            .instrument(span)
        }))
        .await?;

        Ok(rsps.into_iter().collect())
    }
}

async fn port_forward(api: &Api<Pod>, pod: &str, port: u16) -> Result<Portforwarder> {
    let mut attempt = 1;
    loop {
        match api.portforward(pod, &[port]).await {
            Err(kube::Error::UpgradeConnection(
                kube::client::UpgradeConnectionError::ProtocolSwitch(status),
            )) if attempt < PORT_FORWARD_ATTEMPTS => {
                tracing::info!(?status, attempt, "Flakey port forward; retrying");
                attempt += 1;
                time::sleep(PORT_FORWARD_BACKOFF).await;
            }
            res => return res.with_context(|| format!("failed to port-forward to {pod}:{port}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> KubeDiscovery {
        let config = kube::Config::new("http://127.0.0.1:6443".parse().unwrap());
        let client = kube::Client::try_from(config).expect("must build client");
        KubeDiscovery::new(client)
    }

    #[tokio::test]
    async fn default_list_params() {
        let params = discovery().list_params();
        assert_eq!(params.label_selector.as_deref(), Some("app=istiod"));
        assert_eq!(params.field_selector.as_deref(), Some("status.phase=Running"));
    }

    #[tokio::test]
    async fn revision_list_params() {
        let params = discovery()
            .with_selector("app=istiod,istio=pilot")
            .with_revision(Some("canary".to_string()))
            .list_params();
        assert_eq!(
            params.label_selector.as_deref(),
            Some("app=istiod,istio=pilot,istio.io/rev=canary")
        );
    }

    #[tokio::test]
    async fn empty_revision_is_ignored() {
        let params = discovery().with_revision(Some(String::new())).list_params();
        assert_eq!(params.label_selector.as_deref(), Some("app=istiod"));
    }

    #[tokio::test]
    async fn revision_without_selector() {
        let params = discovery()
            .with_selector("")
            .with_revision(Some("canary".to_string()))
            .list_params();
        assert_eq!(params.label_selector.as_deref(), Some("istio.io/rev=canary"));
    }

    #[test]
    fn non_success_status_fails() {
        let error = check_status(
            "istiod-7c9d",
            "/debug/syncz",
            hyper::StatusCode::SERVICE_UNAVAILABLE,
            Bytes::from_static(b"not ready"),
        )
        .expect_err("must fail");
        assert_eq!(
            error.to_string(),
            "istiod-7c9d returned 503 Service Unavailable for /debug/syncz: not ready"
        );

        let body = check_status(
            "istiod-7c9d",
            "/debug/syncz",
            hyper::StatusCode::OK,
            Bytes::from_static(b"[]"),
        )
        .expect("should succeed");
        assert_eq!(body, Bytes::from_static(b"[]"));
    }

    #[tokio::test]
    async fn no_replicas() {
        let svc = tower::service_fn(|req: hyper::Request<kube::client::Body>| async move {
            assert_eq!(req.uri().path(), "/api/v1/namespaces/istio-system/pods");
            let query = req.uri().query().unwrap_or_default();
            assert!(query.contains("labelSelector=app%3Distiod"), "{query}");
            let list = r#"{"apiVersion":"v1","kind":"PodList","metadata":{"resourceVersion":"1"},"items":[]}"#;
            Ok::<_, std::convert::Infallible>(
                hyper::Response::builder()
                    .status(hyper::StatusCode::OK)
                    .header(hyper::header::CONTENT_TYPE, "application/json")
                    .body(kube::client::Body::from(list.as_bytes().to_vec()))
                    .unwrap(),
            )
        });
        let discovery = KubeDiscovery::new(kube::Client::new(svc, "default"));

        let error = discovery
            .all_discovery_do("istio-system", "/debug/syncz")
            .await
            .expect_err("must fail");
        assert_eq!(
            error.to_string(),
            "unable to find any control plane instances in istio-system"
        );
    }
}
