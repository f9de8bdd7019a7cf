//! Target resolution
//!
//! Turns a (plugin, container) pair into a fully-specified remote
//! endpoint descriptor. Descriptors are derived, never persisted, and
//! must be built fresh per call because credentials may rotate.

use crate::config::ControlConfig;
use crate::error::Result;
use crate::settings::store::{SettingEntry, SettingsStore};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_PORT: u16 = 11334;
const DEFAULT_TIMEOUT_SECS: u64 = 8;

/// Ephemeral connection descriptor for one remote mail-server instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub container: String,
    pub host: String,
    pub port: u16,
    pub scheme: String,
    /// Absent when the container has no API key provisioned yet.
    /// Downstream callers report "key missing" instead of a generic
    /// connection failure.
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl Target {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

pub struct TargetResolver<'a> {
    store: &'a SettingsStore,
    default_scheme: String,
    default_port: u16,
    default_timeout: Duration,
}

impl<'a> TargetResolver<'a> {
    pub fn new(store: &'a SettingsStore) -> Self {
        Self {
            store,
            default_scheme: DEFAULT_SCHEME.to_string(),
            default_port: DEFAULT_PORT,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolver whose fallbacks come from the application config instead
    /// of the built-in constants. Per-container settings still win.
    pub fn with_control(store: &'a SettingsStore, control: &ControlConfig) -> Self {
        Self {
            store,
            default_scheme: control.scheme.clone(),
            default_port: control.port,
            default_timeout: Duration::from_secs(control.timeout_secs),
        }
    }

    /// Build a target from stored settings, merged with caller-supplied
    /// inline entries.
    ///
    /// Inline entries win over stored ones; they carry values that have
    /// not been persisted yet, e.g. during first-time setup.
    pub async fn resolve(
        &self,
        plugin: &str,
        container: &str,
        extra: &[SettingEntry],
    ) -> Result<Target> {
        let mut merged: BTreeMap<String, String> = self
            .store
            .get_settings(plugin, container)
            .await?
            .into_iter()
            .map(|e| (e.name, e.value))
            .collect();

        for entry in extra {
            merged.insert(entry.name.clone(), entry.value.clone());
        }

        let auth_token = match self
            .store
            .get_setting(plugin, container, "api_key", true)
            .await
        {
            Ok(token) => token,
            // An unreadable stored key behaves like an absent one; inline
            // keys below can still supply a usable credential.
            Err(e) => {
                debug!("Stored api_key for {container} unusable: {e}");
                None
            }
        };
        let auth_token = merged
            .get("api_key")
            .filter(|_| extra.iter().any(|e| e.name == "api_key"))
            .cloned()
            .or(auth_token)
            .filter(|t| !t.is_empty());

        let host = merged
            .get("host")
            .cloned()
            .unwrap_or_else(|| container.to_string());
        let port = merged
            .get("port")
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.default_port);
        let scheme = merged
            .get("scheme")
            .cloned()
            .unwrap_or_else(|| self.default_scheme.clone());
        let timeout = merged
            .get("timeout")
            .and_then(|t| t.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        debug!(
            "Resolved target for {container}: {scheme}://{host}:{port}, key {}",
            if auth_token.is_some() { "present" } else { "missing" }
        );

        Ok(Target {
            container: container.to_string(),
            host,
            port,
            scheme,
            auth_token,
            timeout,
        })
    }
}
