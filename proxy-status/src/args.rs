use crate::output::{self, Output};
use anyhow::{bail, Context, Result};
use clap::Parser;
use istio_proxy_status_core::{self as proxy_status, CancellationToken};
use istio_proxy_status_k8s::{KubeDiscovery, DEFAULT_DEBUG_PORT, DEFAULT_SELECTOR};
use std::{io::IsTerminal, time::Duration};
use tokio::time;
use tracing::{debug, info_span, Instrument};

/// Report the sync status of every proxy connected to the control plane
#[derive(Debug, Parser)]
#[clap(name = "proxy-status", version, about)]
pub struct Args {
    #[clap(
        long,
        default_value = "istio_proxy_status=info,warn",
        env = "PROXY_STATUS_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// Namespace where the control plane is installed
    #[clap(
        long,
        short = 'i',
        default_value = "istio-system",
        env = "ISTIO_NAMESPACE"
    )]
    istio_namespace: String,

    /// Label selector matching control plane replicas
    #[clap(long, default_value = DEFAULT_SELECTOR)]
    selector: String,

    /// Control plane revision to query
    #[clap(long, short = 'r')]
    revision: Option<String>,

    #[clap(long, default_value_t = DEFAULT_DEBUG_PORT)]
    debug_port: u16,

    /// Gives up on the query after this long (e.g. `30s`, `500ms`)
    #[clap(long, default_value = "30s")]
    timeout: Timeout,

    #[clap(long, short = 'o', value_enum, default_value = "table")]
    output: Output,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Timeout(Duration);

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            istio_namespace,
            selector,
            revision,
            debug_port,
            timeout: Timeout(timeout),
            output,
        } = self;

        log_format
            .try_init(log_level)
            .context("must configure logging")?;

        let client = client.try_client().await?;
        let discovery = KubeDiscovery::new(client)
            .with_selector(selector)
            .with_revision(revision)
            .with_port(debug_port);

        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                time::sleep(timeout).await;
                debug!(?timeout, "Query timed out");
                cancel.cancel();
            }
        });

        let statuses = proxy_status::sync_statuses(&discovery, &istio_namespace, &cancel)
            .instrument(info_span!("query", ns = %istio_namespace))
            .await;
        let statuses = match statuses {
            Err(proxy_status::Error::Cancelled) => {
                bail!("timed out after {timeout:?} waiting for the control plane")
            }
            res => res?,
        };

        let stdout = std::io::stdout();
        let color = stdout.is_terminal();
        output::write(&mut stdout.lock(), output, &statuses, color)?;
        Ok(())
    }
}

// === impl Timeout ===

impl std::str::FromStr for Timeout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (value, scale) = if let Some(ms) = s.strip_suffix("ms") {
            (ms, Duration::from_millis(1))
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, Duration::from_secs(1))
        } else {
            (s, Duration::from_secs(1))
        };
        let value = value
            .parse::<u32>()
            .with_context(|| format!("invalid timeout: {s}"))?;
        if value == 0 {
            bail!("timeout must be positive");
        }
        Ok(Self(scale * value))
    }
}
