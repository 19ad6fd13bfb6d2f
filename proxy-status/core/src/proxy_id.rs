/// A proxy identifier of the form `<kind>~<ip>~<pod>.<namespace>~<domain>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyId<'a> {
    pub kind: &'a str,
    pub ip: &'a str,
    pub pod: &'a str,
    pub namespace: &'a str,
    pub domain: &'a str,
}

// === impl ProxyId ===

impl<'a> ProxyId<'a> {
    pub fn parse(id: &'a str) -> Option<Self> {
        let mut parts = id.split('~');
        let kind = parts.next().filter(|s| !s.is_empty())?;
        let ip = parts.next()?;
        let workload = parts.next()?;
        let domain = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        // Pod names can't contain dots, so the namespace starts at the first one.
        let (pod, namespace) = workload.split_once('.')?;
        if pod.is_empty() || namespace.is_empty() {
            return None;
        }

        Some(Self {
            kind,
            ip,
            pod,
            namespace,
            domain,
        })
    }
}

impl ProxyId<'_> {
    /// Formats a proxy for display as `<pod>.<namespace>`, falling back to
    /// the raw identifier when it doesn't parse.
    pub fn display_name(id: &str) -> String {
        match ProxyId::parse(id) {
            Some(id) => format!("{}.{}", id.pod, id.namespace),
            None => id.to_string(),
        }
    }
}
