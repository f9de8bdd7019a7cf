//! Mail-record publishing
//!
//! Loads the encrypted provider profile for a container and pushes the
//! three mail TXT records through whichever vendor the profile names.
//! Upserts are discriminated by content prefix so unrelated TXT records
//! at the same host survive a publish.

use crate::dns::provider::{ProviderCredentials, ProviderRegistry, UpsertOutcome};
use crate::error::{ConsoleError, Result};
use crate::settings::SettingsStore;
use tracing::info;

/// Settings-store coordinates of the provider profile.
const PROFILE_PLUGIN: &str = "dnscontrol";
const PROFILE_NAME: &str = "profile";

/// One of the TXT records the appliance manages for a domain.
#[derive(Debug, Clone, PartialEq)]
pub enum MailRecord {
    Spf { domain: String, content: String },
    Dkim {
        domain: String,
        selector: String,
        content: String,
    },
    Dmarc { domain: String, content: String },
}

impl MailRecord {
    pub fn domain(&self) -> &str {
        match self {
            Self::Spf { domain, .. } | Self::Dkim { domain, .. } | Self::Dmarc { domain, .. } => {
                domain
            }
        }
    }

    pub fn host(&self) -> String {
        match self {
            Self::Spf { domain, .. } => domain.clone(),
            Self::Dkim {
                domain, selector, ..
            } => format!("{selector}._domainkey.{domain}"),
            Self::Dmarc { domain, .. } => format!("_dmarc.{domain}"),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Spf { content, .. }
            | Self::Dkim { content, .. }
            | Self::Dmarc { content, .. } => content,
        }
    }

    pub fn content_prefix(&self) -> &'static str {
        match self {
            Self::Spf { .. } => "v=spf1",
            Self::Dkim { .. } => "v=DKIM1",
            Self::Dmarc { .. } => "v=DMARC1",
        }
    }
}

pub struct DnsPublisher<'a> {
    store: &'a SettingsStore,
    registry: &'a ProviderRegistry,
}

impl<'a> DnsPublisher<'a> {
    pub fn new(store: &'a SettingsStore, registry: &'a ProviderRegistry) -> Self {
        Self { store, registry }
    }

    /// Load and parse the container's provider profile.
    pub async fn load_profile(&self, container: &str) -> Result<ProviderCredentials> {
        let raw = self
            .store
            .get_setting(PROFILE_PLUGIN, container, PROFILE_NAME, true)
            .await?
            .ok_or_else(|| {
                ConsoleError::invalid(format!(
                    "no DNS provider profile configured for {container}"
                ))
            })?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        ProviderCredentials::from_json(value)
    }

    /// Publish one TXT record, creating or updating in place.
    pub async fn publish(&self, container: &str, record: &MailRecord) -> Result<UpsertOutcome> {
        let creds = self.load_profile(container).await?;
        let provider = self.registry.get(creds.provider_type())?;

        let zone = provider.resolve_zone(record.domain(), &creds).await?;
        let outcome = provider
            .upsert_record(
                &zone,
                &record.host(),
                record.content(),
                &creds,
                Some(record.content_prefix()),
            )
            .await?;
        info!(
            host = %record.host(),
            zone = %zone.name,
            ?outcome,
            "published TXT record"
        );
        Ok(outcome)
    }
}
