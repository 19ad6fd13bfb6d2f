use bytes::Bytes;
use std::collections::BTreeMap;

/// The debug route on each control plane replica that reports the sync status
/// of its connected proxies.
pub const SYNCZ_PATH: &str = "/debug/syncz";

/// Raw response bodies keyed by replica name.
///
/// Ordered so that anything iterating over replicas does so deterministically.
pub type Responses = BTreeMap<String, Bytes>;

/// Issues a request against every control plane replica in a namespace.
///
/// Any error is fatal for the whole fan-out; implementations don't return
/// partial results.
#[async_trait::async_trait]
pub trait DiscoveryClient: Send + Sync {
    async fn all_discovery_do(&self, namespace: &str, path: &str) -> anyhow::Result<Responses>;
}
