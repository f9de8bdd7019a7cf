//! Environment snapshot pulling
//!
//! Four independent phases: environment dump, version probe, daemon
//! configuration dump, signing-key discovery. A failed phase logs and
//! contributes nothing; only a transport failure on the initial dump
//! aborts the pull, since that means the container is unreachable.

use crate::error::Result;
use crate::exec::{ExecOpts, RemoteShell};
use crate::parsers::confdump::{self, ConfNode};
use crate::settings::target::Target;
use crate::stack::dkim;
use crate::stack::domains::{DomainRecord, DomainRegistry};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Environment variables recognized by the console.
///
/// Anything else in the container environment is noise (PATH, HOSTNAME,
/// shell internals) and is dropped from the snapshot.
const ENV_ALLOW: &[&str] = &[
    "OVERRIDE_HOSTNAME",
    "LOG_LEVEL",
    "SSL_TYPE",
    "PERMIT_DOCKER",
    "SMTP_ONLY",
    "ENABLE_RSPAMD",
    "ENABLE_CLAMAV",
    "ENABLE_FAIL2BAN",
    "ENABLE_POSTGREY",
    "ENABLE_SASLAUTHD",
    "ENABLE_MANAGESIEVE",
    "ENABLE_QUOTAS",
    "ENABLE_FETCHMAIL",
    "ENABLE_SRS",
    "POSTMASTER_ADDRESS",
    "REPORT_RECIPIENT",
    "RELAY_HOST",
    "RELAY_PORT",
    "FETCHMAIL_POLL",
    "POSTSCREEN_ACTION",
    "TLS_LEVEL",
    "SPOOF_PROTECTION",
];

/// Path of the signing configuration inside the container.
const DKIM_CONF_PATH: &str = "/etc/rspamd/local.d/dkim_signing.conf";

/// Pull a flattened environment snapshot from a running container.
///
/// Repeated pulls against an unchanged remote are merge-stable: the
/// returned map is rebuilt from scratch and domain discovery upserts by
/// domain name.
pub async fn pull_server_envs(
    shell: &dyn RemoteShell,
    target: &Target,
    registry: &DomainRegistry,
) -> Result<BTreeMap<String, String>> {
    let mut envs = BTreeMap::new();

    // Phase 1: raw environment dump. Transport failure here aborts the
    // whole pull; the container is not reachable at all.
    let dump = shell
        .exec_command("printenv", target, ExecOpts::default())
        .await?;
    if dump.success() {
        for line in dump.stdout.lines() {
            if let Some((name, value)) = line.split_once('=') {
                if ENV_ALLOW.contains(&name) {
                    envs.insert(name.to_string(), value.to_string());
                }
            }
        }
    } else {
        warn!(
            "Environment dump failed on {}: {}",
            target.container,
            dump.stderr.trim()
        );
    }

    // Phase 2: version probe.
    match shell.exec_setup("version", target, ExecOpts::default()).await {
        Ok(output) if output.success() => {
            let version = output.stdout.trim();
            if !version.is_empty() {
                envs.insert("version".to_string(), version.to_string());
            }
        }
        Ok(output) => warn!(
            "Version probe failed on {}: {}",
            target.container,
            output.stderr.trim()
        ),
        Err(e) => warn!("Version probe failed on {}: {e}", target.container),
    }

    // Phase 3: daemon configuration dump.
    match shell
        .exec_command("doveconf", target, ExecOpts::default())
        .await
    {
        Ok(output) if output.success() => {
            let tree = confdump::parse(&output.stdout);
            // Plugin flags first; a real `fts = …` setting from the
            // plugin section wins over the bare boolean.
            collect_plugin_flags(&tree, &mut envs);
            collect_fts_settings(&tree, &mut envs);
        }
        Ok(output) => warn!(
            "Configuration dump failed on {}: {}",
            target.container,
            output.stderr.trim()
        ),
        Err(e) => warn!("Configuration dump failed on {}: {e}", target.container),
    }

    // Phase 4: signing-key discovery.
    if let Err(e) = discover_signing_domains(shell, target, registry).await {
        warn!("Signing-key discovery failed on {}: {e}", target.container);
    }

    Ok(envs)
}

/// Full-text-search plugin settings from the `plugin` section.
fn collect_fts_settings(tree: &ConfNode, envs: &mut BTreeMap<String, String>) {
    let Some(ConfNode::Section(plugin)) = tree.get_path(&["plugin"]) else {
        return;
    };
    for (key, node) in plugin {
        if key.starts_with("fts") {
            if let ConfNode::Leaf(value) = node {
                envs.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Space-separated plugin list; each plugin name becomes a boolean key.
fn collect_plugin_flags(tree: &ConfNode, envs: &mut BTreeMap<String, String>) {
    if let Some(list) = tree.leaf_at(&["mail_plugins"]) {
        for plugin in list.split_whitespace() {
            envs.insert(plugin.to_string(), "1".to_string());
        }
    }
}

/// Discover per-domain signing selectors and upsert a row per domain.
///
/// Prefers the per-domain section of the signing configuration; falls
/// back to listing the key directory and probing each key file.
async fn discover_signing_domains(
    shell: &dyn RemoteShell,
    target: &Target,
    registry: &DomainRegistry,
) -> Result<()> {
    let output = shell
        .exec_command(
            &format!("cat {DKIM_CONF_PATH}"),
            target,
            ExecOpts::default(),
        )
        .await?;

    if output.success() {
        let tree = confdump::parse(&output.stdout);
        if let Some(ConfNode::Section(domains)) = tree.get_path(&["domain"]) {
            for (name, node) in domains {
                let Some(selector) = node.leaf_at(&["selector"]) else {
                    debug!("Signing section for {name} has no selector, skipped");
                    continue;
                };
                let path = node
                    .leaf_at(&["path"])
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}/{name}.{selector}.key", dkim::KEY_DIR));

                upsert_probed(shell, target, registry, name, selector, &path).await;
            }
            return Ok(());
        }
        debug!("Signing configuration has no per-domain section, falling back");
    } else {
        debug!(
            "Signing configuration fetch failed on {}: {}",
            target.container,
            output.stderr.trim()
        );
    }

    for (domain, selector, path) in dkim::discover_key_files(shell, target).await? {
        upsert_probed(shell, target, registry, &domain, &selector, &path).await;
    }
    Ok(())
}

async fn upsert_probed(
    shell: &dyn RemoteShell,
    target: &Target,
    registry: &DomainRegistry,
    domain: &str,
    selector: &str,
    path: &str,
) {
    let info = match dkim::probe_key(shell, target, path).await {
        Ok(info) => info,
        Err(e) => {
            warn!("Key probe for {domain} failed: {e}");
            return;
        }
    };

    let record = DomainRecord {
        name: domain.to_string(),
        container: target.container.clone(),
        dkim_selector: selector.to_string(),
        key_type: info.key_type,
        key_size: info.key_size,
        key_path: path.to_string(),
    };
    if let Err(e) = registry.upsert(&record).await {
        warn!("Domain upsert for {domain} failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecOutput, ScriptedShell};
    use sqlx::sqlite::SqlitePoolOptions;
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

    async fn registry() -> DomainRegistry {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let registry = DomainRegistry::new(pool);
        registry.init_db().await.unwrap();
        registry
    }

    fn scripted() -> ScriptedShell {
        ScriptedShell::new()
            .on(
                "printenv",
                ExecOutput::ok(
                    "PATH=/usr/bin\nSSL_TYPE=letsencrypt\nENABLE_RSPAMD=1\nHOSTNAME=mail1\nPERMIT_DOCKER=none\n",
                ),
            )
            .on("setup version", ExecOutput::ok("13.3.1\n"))
            .on(
                "doveconf",
                ExecOutput::ok(
                    "mail_plugins = quota fts fts_xapian\nplugin {\n  fts = xapian\n  fts_autoindex = yes\n  quota_rule = *:storage=1G\n}\n",
                ),
            )
            .on(
                "cat /etc/rspamd/local.d/dkim_signing.conf",
                ExecOutput::ok(
                    "domain {\n  example.com {\n    selector = mail\n    path = /var/lib/rspamd/dkim/example.com.mail.key\n  }\n}\n",
                ),
            )
            .on(
                "openssl pkey -in '/var/lib/rspamd/dkim/example.com.mail.key'",
                ExecOutput::ok("RSA Private-Key: (2048 bit, 2 primes)\n"),
            )
    }

    #[tokio::test]
    async fn test_full_pull() {
        let shell = scripted();
        let registry = registry().await;

        let envs = pull_server_envs(&shell, &target(), &registry).await.unwrap();

        // Allow-listed env vars only
        assert_eq!(envs.get("SSL_TYPE").map(String::as_str), Some("letsencrypt"));
        assert_eq!(envs.get("PERMIT_DOCKER").map(String::as_str), Some("none"));
        assert!(!envs.contains_key("PATH"));
        assert!(!envs.contains_key("HOSTNAME"));

        // Version probe
        assert_eq!(envs.get("version").map(String::as_str), Some("13.3.1"));

        // fts settings and plugin booleans
        assert_eq!(envs.get("fts").map(String::as_str), Some("xapian"));
        assert_eq!(envs.get("fts_autoindex").map(String::as_str), Some("yes"));
        assert!(!envs.contains_key("quota_rule"));
        assert_eq!(envs.get("quota").map(String::as_str), Some("1"));
        assert_eq!(envs.get("fts_xapian").map(String::as_str), Some("1"));

        // Domain discovery
        let row = registry.get("example.com").await.unwrap().unwrap();
        assert_eq!(row.dkim_selector, "mail");
        assert_eq!(row.key_type, "rsa");
        assert_eq!(row.key_size.as_deref(), Some("2048"));
    }

    #[tokio::test]
    async fn test_pull_is_merge_stable() {
        let shell = scripted();
        let registry = registry().await;

        let first = pull_server_envs(&shell, &target(), &registry).await.unwrap();
        let second = pull_server_envs(&shell, &target(), &registry).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_phases_are_omitted() {
        // Only the env dump works; every other phase fails
        let shell = ScriptedShell::new().on("printenv", ExecOutput::ok("SSL_TYPE=manual\n"));
        let registry = registry().await;

        let envs = pull_server_envs(&shell, &target(), &registry).await.unwrap();
        assert_eq!(envs.get("SSL_TYPE").map(String::as_str), Some("manual"));
        assert!(!envs.contains_key("version"));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_to_key_directory() {
        let shell = ScriptedShell::new()
            .on("printenv", ExecOutput::ok(""))
            .on("setup version", ExecOutput::ok("13.3.1\n"))
            .on("doveconf", ExecOutput::ok(""))
            .on(
                "cat /etc/rspamd/local.d/dkim_signing.conf",
                ExecOutput::failed(1, "No such file or directory"),
            )
            .on("ls -1", ExecOutput::ok("example.org.dkim.key\n"))
            .on(
                "openssl pkey",
                ExecOutput::ok("ED25519 Private-Key:\npriv:\n"),
            );
        let registry = registry().await;

        pull_server_envs(&shell, &target(), &registry).await.unwrap();

        let row = registry.get("example.org").await.unwrap().unwrap();
        assert_eq!(row.dkim_selector, "dkim");
        assert_eq!(row.key_type, "ed25519");
    }
}
