//! Resource usage snapshot
//!
//! Monitor and disk-usage fetches are independent, so they are issued
//! concurrently and awaited jointly. Either half failing leaves its part
//! of the snapshot empty; the poller keeps running regardless.

use crate::error::Result;
use crate::exec::{ExecOpts, RemoteShell};
use crate::parsers::monitor::{self, MonitorSnapshot};
use crate::settings::target::Target;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ResourceSnapshot {
    pub monitor: MonitorSnapshot,
    pub disk: BTreeMap<String, String>,
}

/// Pull a combined resource snapshot from the container.
pub async fn pull_resources(shell: &dyn RemoteShell, target: &Target) -> Result<ResourceSnapshot> {
    let (top, df) = tokio::join!(
        shell.exec_command("top -bn1 | head -n7", target, ExecOpts::default()),
        shell.exec_command("df -P /var/mail | tail -n1", target, ExecOpts::default()),
    );

    let monitor = match top {
        Ok(output) if output.success() => monitor::parse(&output.stdout),
        Ok(output) => {
            warn!(
                "Monitor fetch failed on {}: {}",
                target.container,
                output.stderr.trim()
            );
            MonitorSnapshot::default()
        }
        Err(e) => {
            warn!("Monitor fetch failed on {}: {e}", target.container);
            MonitorSnapshot::default()
        }
    };

    let disk = match df {
        Ok(output) if output.success() => parse_df(&output.stdout),
        Ok(output) => {
            warn!(
                "Disk fetch failed on {}: {}",
                target.container,
                output.stderr.trim()
            );
            BTreeMap::new()
        }
        Err(e) => {
            warn!("Disk fetch failed on {}: {e}", target.container);
            BTreeMap::new()
        }
    };

    Ok(ResourceSnapshot { monitor, disk })
}

/// Parse one POSIX `df` data line: filesystem, blocks, used, available,
/// capacity, mount point.
fn parse_df(text: &str) -> BTreeMap<String, String> {
    let mut disk = BTreeMap::new();
    let Some(line) = text.lines().find(|l| !l.trim().is_empty()) else {
        return disk;
    };
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 6 {
        return disk;
    }

    disk.insert("filesystem".to_string(), parts[0].to_string());
    disk.insert("blocks".to_string(), parts[1].to_string());
    disk.insert("used".to_string(), parts[2].to_string());
    disk.insert("available".to_string(), parts[3].to_string());
    disk.insert(
        "use_percent".to_string(),
        parts[4].trim_end_matches('%').to_string(),
    );
    disk.insert("mounted_on".to_string(), parts[5].to_string());
    disk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecOutput, ScriptedShell};
    use std::time::Duration;

    fn target() -> Target {
        Target {
            container: "mail1".to_string(),
            host: "mail1".to_string(),
            port: 11334,
            scheme: "http".to_string(),
            auth_token: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_combined_snapshot() {
        let shell = ScriptedShell::new()
            .on(
                "top -bn1",
                ExecOutput::ok(
                    "top - 14:12:03 up 12 days,  3:14,  1 user,  load average: 0.01, 0.05, 0.10\n\
                     Tasks: 123 total,   1 running, 120 sleeping,   1 stopped,   1 zombie\n",
                ),
            )
            .on(
                "df -P",
                ExecOutput::ok("/dev/sda1 41152812 10288203 30864609 25% /var/mail\n"),
            );

        let snap = pull_resources(&shell, &target()).await.unwrap();
        assert_eq!(snap.monitor.uptime["days"], "12");
        assert_eq!(snap.disk["use_percent"], "25");
        assert_eq!(snap.disk["mounted_on"], "/var/mail");
    }

    #[tokio::test]
    async fn test_half_failure_keeps_other_half() {
        let shell = ScriptedShell::new()
            .on("top -bn1", ExecOutput::failed(1, "top: not found"))
            .on(
                "df -P",
                ExecOutput::ok("/dev/sda1 41152812 10288203 30864609 25% /var/mail\n"),
            );

        let snap = pull_resources(&shell, &target()).await.unwrap();
        assert!(snap.monitor.uptime.is_empty());
        assert_eq!(snap.disk["use_percent"], "25");
    }

    #[test]
    fn test_parse_df_malformed() {
        assert!(parse_df("garbage").is_empty());
        assert!(parse_df("").is_empty());
    }
}
