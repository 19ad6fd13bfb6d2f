#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The fan-out to control plane replicas failed. The underlying error is
    /// surfaced as-is.
    #[error(transparent)]
    Transport(anyhow::Error),

    #[error("failed to decode sync status from replica {replica}: {source}")]
    Decode {
        replica: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("query cancelled")]
    Cancelled,

    #[error("a control plane namespace must be specified")]
    EmptyNamespace,

    #[error("failed to get proxy infos: {0}")]
    ProxyInfos(#[source] Box<Error>),
}
