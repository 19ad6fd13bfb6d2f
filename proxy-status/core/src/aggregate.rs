use crate::{sync_status, Error, Responses, SyncStatus};
use ahash::AHashSet;

/// A sync status along with the control plane replica that reported it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaStatus {
    pub replica: String,
    pub status: SyncStatus,
}

/// Decodes every replica's response and merges the results so that each proxy
/// appears once.
///
/// Replicas are visited in name order and the first record seen for a proxy
/// is kept. A proxy may be reported by more than one replica while it
/// reconnects, but all such records describe the same proxy and version.
pub fn aggregate(responses: &Responses) -> Result<Vec<ReplicaStatus>, Error> {
    let mut seen = AHashSet::new();
    let mut merged = Vec::new();

    for (replica, bytes) in responses {
        let statuses = sync_status::decode(replica, bytes)?;
        tracing::debug!(%replica, proxies = statuses.len(), "Decoded sync status");

        for status in statuses {
            if !seen.insert(status.proxy_id.clone()) {
                tracing::debug!(
                    %replica,
                    proxy = %status.proxy_id,
                    "Proxy already reported by another replica"
                );
                continue;
            }
            merged.push(ReplicaStatus {
                replica: replica.clone(),
                status,
            });
        }
    }

    Ok(merged)
}
