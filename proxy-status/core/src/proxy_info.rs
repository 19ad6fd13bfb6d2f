use crate::ReplicaStatus;
use serde::Serialize;

/// The flattened view of a proxy returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub istio_version: String,
}

pub fn to_proxy_info(statuses: &[ReplicaStatus]) -> Vec<ProxyInfo> {
    statuses.iter().map(ProxyInfo::from).collect()
}

pub fn to_ids(infos: &[ProxyInfo]) -> Vec<String> {
    infos.iter().map(|info| info.id.clone()).collect()
}

impl From<&ReplicaStatus> for ProxyInfo {
    fn from(ReplicaStatus { status, .. }: &ReplicaStatus) -> Self {
        Self {
            id: status.proxy_id.clone(),
            type_: status.proxy_type.clone(),
            istio_version: status.istio_version.clone(),
        }
    }
}
