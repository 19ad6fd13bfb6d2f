use crate::Error;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A single proxy's sync state as reported by one control plane replica.
///
/// Every field defaults to empty when it is missing or `null`, since the
/// control plane omits or nulls fields it hasn't set. Unknown fields are
/// ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SyncStatus {
    #[serde(rename = "proxy", default, deserialize_with = "nullable")]
    pub proxy_id: String,

    #[serde(default, deserialize_with = "nullable")]
    pub proxy_type: String,

    #[serde(default, deserialize_with = "nullable")]
    pub istio_version: String,

    #[serde(default, deserialize_with = "nullable")]
    pub cluster_id: String,

    #[serde(default, deserialize_with = "nullable")]
    pub proxy_version: String,

    #[serde(flatten)]
    pub xds: XdsSync,
}

/// The nonces the control plane last sent and the proxy last acknowledged,
/// per xDS config type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct XdsSync {
    #[serde(default, deserialize_with = "nullable")]
    pub cluster_sent: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cluster_acked: String,
    #[serde(default, deserialize_with = "nullable")]
    pub listener_sent: String,
    #[serde(default, deserialize_with = "nullable")]
    pub listener_acked: String,
    #[serde(default, deserialize_with = "nullable")]
    pub route_sent: String,
    #[serde(default, deserialize_with = "nullable")]
    pub route_acked: String,
    #[serde(default, deserialize_with = "nullable")]
    pub endpoint_sent: String,
    #[serde(default, deserialize_with = "nullable")]
    pub endpoint_acked: String,
    #[serde(default, deserialize_with = "nullable")]
    pub extension_config_sent: String,
    #[serde(default, deserialize_with = "nullable")]
    pub extension_config_acked: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum XdsType {
    Cluster,
    Listener,
    Endpoint,
    Route,
    ExtensionConfig,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum XdsState {
    NotSent,
    Synced,
    NeverAcknowledged,
    Stale,
}

/// Decodes one replica's `syncz` payload.
///
/// A JSON `null` is what the control plane writes for an empty list, so it
/// decodes as no records.
pub fn decode(replica: &str, bytes: &[u8]) -> Result<Vec<SyncStatus>, Error> {
    let statuses = serde_json::from_slice::<Option<Vec<SyncStatus>>>(bytes).map_err(|source| {
        tracing::debug!(%replica, error = %source, "Invalid sync status payload");
        Error::Decode {
            replica: replica.to_string(),
            source,
        }
    })?;
    Ok(statuses.unwrap_or_default())
}

fn nullable<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(d).map(Option::unwrap_or_default)
}

// === impl SyncStatus ===

impl SyncStatus {
    pub fn xds_state(&self, ty: XdsType) -> XdsState {
        let (sent, acked) = self.xds.get(ty);
        XdsState::from_nonces(sent, acked)
    }
}

// === impl XdsSync ===

impl XdsSync {
    /// Returns the `(sent, acked)` nonces for the given config type.
    pub fn get(&self, ty: XdsType) -> (&str, &str) {
        match ty {
            XdsType::Cluster => (&self.cluster_sent, &self.cluster_acked),
            XdsType::Listener => (&self.listener_sent, &self.listener_acked),
            XdsType::Endpoint => (&self.endpoint_sent, &self.endpoint_acked),
            XdsType::Route => (&self.route_sent, &self.route_acked),
            XdsType::ExtensionConfig => {
                (&self.extension_config_sent, &self.extension_config_acked)
            }
        }
    }
}

// === impl XdsType ===

impl XdsType {
    /// The order in which config types are displayed.
    pub const ALL: [XdsType; 5] = [
        XdsType::Cluster,
        XdsType::Listener,
        XdsType::Endpoint,
        XdsType::Route,
        XdsType::ExtensionConfig,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Cluster => "CDS",
            Self::Listener => "LDS",
            Self::Endpoint => "EDS",
            Self::Route => "RDS",
            Self::ExtensionConfig => "ECDS",
        }
    }
}

// === impl XdsState ===

impl XdsState {
    pub fn from_nonces(sent: &str, acked: &str) -> Self {
        if sent.is_empty() {
            return Self::NotSent;
        }
        if sent == acked {
            return Self::Synced;
        }
        if acked.is_empty() {
            return Self::NeverAcknowledged;
        }
        Self::Stale
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSent => "NOT SENT",
            Self::Synced => "SYNCED",
            Self::NeverAcknowledged => "STALE (Never Acknowledged)",
            Self::Stale => "STALE",
        }
    }
}

impl fmt::Display for XdsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
