use anyhow::Result;
use istio_proxy_status_core::{
    to_ids, to_proxy_info, ProxyId, ReplicaStatus, XdsState, XdsType,
};
use owo_colors::OwoColorize;
use std::io::Write;

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Output {
    Table,
    Json,
    Ids,
}

const HEADERS: [&str; 9] = [
    "NAME", "CLUSTER", "CDS", "LDS", "EDS", "RDS", "ECDS", "ISTIOD", "VERSION",
];

const COLUMN_GAP: usize = 3;

/// A row of the status table.
#[derive(Debug, PartialEq, Eq)]
struct Row<'a> {
    name: String,
    cluster: &'a str,
    states: [XdsState; 5],
    replica: &'a str,
    version: &'a str,
}

pub fn write<W: Write>(
    out: &mut W,
    output: Output,
    statuses: &[ReplicaStatus],
    color: bool,
) -> Result<()> {
    match output {
        Output::Table => write_table(out, statuses, color)?,
        Output::Json => {
            serde_json::to_writer_pretty(&mut *out, &to_proxy_info(statuses))?;
            writeln!(out)?;
        }
        Output::Ids => {
            for id in to_ids(&to_proxy_info(statuses)) {
                writeln!(out, "{id}")?;
            }
        }
    }
    Ok(())
}

fn rows(statuses: &[ReplicaStatus]) -> Vec<Row<'_>> {
    let mut rows = statuses
        .iter()
        .map(|ReplicaStatus { replica, status }| Row {
            name: ProxyId::display_name(&status.proxy_id),
            cluster: &status.cluster_id,
            states: XdsType::ALL.map(|ty| status.xds_state(ty)),
            replica,
            version: &status.istio_version,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

fn write_table<W: Write>(out: &mut W, statuses: &[ReplicaStatus], color: bool) -> Result<()> {
    let rows = rows(statuses);

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (i, cell) in row.cells().iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let last = HEADERS.len() - 1;
    for (i, header) in HEADERS.iter().enumerate() {
        if i == last {
            writeln!(out, "{header}")?;
        } else {
            write!(out, "{header:<w$}", w = widths[i] + COLUMN_GAP)?;
        }
    }

    for row in &rows {
        for (i, cell) in row.cells().iter().enumerate() {
            let padded = if i == last {
                cell.to_string()
            } else {
                format!("{cell:<w$}", w = widths[i] + COLUMN_GAP)
            };
            match (color, row.state(i)) {
                (true, Some(XdsState::Synced)) => write!(out, "{}", padded.green())?,
                (true, Some(XdsState::Stale | XdsState::NeverAcknowledged)) => {
                    write!(out, "{}", padded.red())?
                }
                (true, Some(XdsState::NotSent)) => write!(out, "{}", padded.dimmed())?,
                _ => write!(out, "{padded}")?,
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

// === impl Row ===

impl Row<'_> {
    fn cells(&self) -> [&str; 9] {
        let [cds, lds, eds, rds, ecds] = self.states.map(|s| s.as_str());
        [
            &self.name,
            self.cluster,
            cds,
            lds,
            eds,
            rds,
            ecds,
            self.replica,
            self.version,
        ]
    }

    /// Returns the sync state displayed in column `i`, if any.
    fn state(&self, i: usize) -> Option<XdsState> {
        (2..7).contains(&i).then(|| self.states[i - 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use istio_proxy_status_core::{SyncStatus, XdsSync};

    fn statuses() -> Vec<ReplicaStatus> {
        vec![
            ReplicaStatus {
                replica: "istiod-7c9d".to_string(),
                status: SyncStatus {
                    proxy_id: "sidecar~10.0.0.2~reviews-v1.bookinfo~cluster.local".to_string(),
                    proxy_type: "sidecar".to_string(),
                    istio_version: "1.18.0".to_string(),
                    cluster_id: "Kubernetes".to_string(),
                    xds: XdsSync {
                        cluster_sent: "n1".to_string(),
                        cluster_acked: "n1".to_string(),
                        listener_sent: "n2".to_string(),
                        listener_acked: "n1".to_string(),
                        endpoint_sent: "n3".to_string(),
                        ..XdsSync::default()
                    },
                    ..SyncStatus::default()
                },
            },
            ReplicaStatus {
                replica: "istiod-5f4b".to_string(),
                status: SyncStatus {
                    proxy_id: "router~10.0.0.1~gw.istio-system~cluster.local".to_string(),
                    proxy_type: "router".to_string(),
                    istio_version: "1.19.1".to_string(),
                    cluster_id: "Kubernetes".to_string(),
                    ..SyncStatus::default()
                },
            },
        ]
    }

    fn render(output: Output) -> String {
        let mut buf = Vec::new();
        write(&mut buf, output, &statuses(), false).expect("must write");
        String::from_utf8(buf).expect("must be utf8")
    }

    #[test]
    fn rows_are_sorted_by_name() {
        let statuses = statuses();
        let rows = rows(&statuses);
        assert_eq!(rows[0].name, "gw.istio-system");
        assert_eq!(rows[1].name, "reviews-v1.bookinfo");
        assert_eq!(
            rows[1].states,
            [
                XdsState::Synced,
                XdsState::Stale,
                XdsState::NeverAcknowledged,
                XdsState::NotSent,
                XdsState::NotSent,
            ]
        );
        assert_eq!(rows[1].replica, "istiod-7c9d");
    }

    #[test]
    fn table() {
        let table = render(Output::Table);
        let lines = table.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);

        let header = lines[0].split_whitespace().collect::<Vec<_>>();
        assert_eq!(header, HEADERS);

        assert!(lines[1].starts_with("gw.istio-system "), "{}", lines[1]);
        assert!(lines[1].ends_with("istiod-5f4b   1.19.1"), "{}", lines[1]);
        assert!(lines[2].contains("STALE (Never Acknowledged)"), "{}", lines[2]);

        // Every column starts at the same offset on every line.
        let eds = lines[0].find("EDS").unwrap();
        assert_eq!(&lines[2][eds..eds + 5], "STALE");
        assert_eq!(&lines[1][eds..eds + 8], "NOT SENT");
    }

    #[test]
    fn json() {
        let json = serde_json::from_str::<serde_json::Value>(&render(Output::Json))
            .expect("must be valid json");
        assert_eq!(
            json,
            serde_json::json!([
                {
                    "id": "sidecar~10.0.0.2~reviews-v1.bookinfo~cluster.local",
                    "type": "sidecar",
                    "istioVersion": "1.18.0",
                },
                {
                    "id": "router~10.0.0.1~gw.istio-system~cluster.local",
                    "type": "router",
                    "istioVersion": "1.19.1",
                },
            ])
        );
    }

    #[test]
    fn ids() {
        assert_eq!(
            render(Output::Ids),
            "sidecar~10.0.0.2~reviews-v1.bookinfo~cluster.local\n\
             router~10.0.0.1~gw.istio-system~cluster.local\n"
        );
    }
}
