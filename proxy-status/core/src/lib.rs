#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Reports which proxies are connected to a horizontally scaled control plane
//! and how far along each one is in receiving its configuration.
//!
//! Each control plane replica only knows about the proxies attached to it, so
//! a query fans out to every replica's `syncz` debug endpoint, decodes each
//! response, and merges the results into one view keyed by proxy ID.

mod aggregate;
mod discovery;
mod error;
mod proxy_id;
mod proxy_info;
mod sync_status;


pub use self::{
    aggregate::{aggregate, ReplicaStatus},
    discovery::{DiscoveryClient, Responses, SYNCZ_PATH},
    error::Error,
    proxy_id::ProxyId,
    proxy_info::{to_ids, to_proxy_info, ProxyInfo},
    sync_status::{SyncStatus, XdsState, XdsSync, XdsType},
};
pub use tokio_util::sync::CancellationToken;

/// Fetches the sync status of every proxy known to the control plane in
/// `namespace`, one record per proxy.
///
/// Fails without a result if the fan-out fails, if any replica's response
/// can't be decoded, or if `cancel` fires before all replicas have responded.
pub async fn sync_statuses<C>(
    client: &C,
    namespace: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ReplicaStatus>, Error>
where
    C: DiscoveryClient + ?Sized,
{
    if namespace.is_empty() {
        return Err(Error::EmptyNamespace);
    }

    let responses = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(%namespace, "Cancelled while waiting for replicas");
            return Err(Error::Cancelled);
        }
        res = client.all_discovery_do(namespace, SYNCZ_PATH) => res.map_err(Error::Transport)?,
    };
    tracing::debug!(%namespace, replicas = responses.len(), "Fetched sync status");

    aggregate(&responses)
}

pub async fn get_proxy_info<C>(client: &C, namespace: &str) -> Result<Vec<ProxyInfo>, Error>
where
    C: DiscoveryClient + ?Sized,
{
    get_proxy_info_cancellable(client, namespace, &CancellationToken::new()).await
}

pub async fn get_proxy_info_cancellable<C>(
    client: &C,
    namespace: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ProxyInfo>, Error>
where
    C: DiscoveryClient + ?Sized,
{
    let statuses = sync_statuses(client, namespace, cancel).await?;
    Ok(to_proxy_info(&statuses))
}

/// Lists the ID of every proxy known to the control plane in `namespace`, in
/// the same order as [`get_proxy_info`].
pub async fn get_ids_from_proxy_info<C>(client: &C, namespace: &str) -> Result<Vec<String>, Error>
where
    C: DiscoveryClient + ?Sized,
{
    get_ids_from_proxy_info_cancellable(client, namespace, &CancellationToken::new()).await
}

pub async fn get_ids_from_proxy_info_cancellable<C>(
    client: &C,
    namespace: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>, Error>
where
    C: DiscoveryClient + ?Sized,
{
    let infos = get_proxy_info_cancellable(client, namespace, cancel)
        .await
        .map_err(|error| Error::ProxyInfos(Box::new(error)))?;
    Ok(to_ids(&infos))
}
