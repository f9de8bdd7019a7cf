//! Provider capability and registry
//!
//! Each vendor implements zone resolution, record lookup and idempotent
//! TXT upsert. Vendor quirks, in particular whether hosts are relative
//! to the zone or fully qualified, stay inside the provider; callers
//! always pass fully-qualified hosts.

use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Decrypted provider profile: `{"type": …, …credentials}`.
#[derive(Debug, Clone)]
pub struct ProviderCredentials(serde_json::Value);

impl ProviderCredentials {
    /// Parse a profile blob. Absence of `type` is a fatal configuration
    /// error; the profile cannot be routed to any provider without it.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if value.get("type").and_then(|t| t.as_str()).is_none() {
            return Err(ConsoleError::Config(
                "DNS provider profile has no type field".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn provider_type(&self) -> &str {
        // Presence checked in from_json
        self.0.get("type").and_then(|t| t.as_str()).unwrap_or("")
    }

    /// Required credential field; missing is a caller error naming the
    /// field but never echoing other profile content.
    pub fn require(&self, field: &str) -> Result<&str> {
        self.0
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ConsoleError::invalid(format!("DNS provider profile is missing {field}"))
            })
    }
}

/// A provider-side administrative unit owning a domain's records.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxtRecord {
    pub id: String,
    pub host: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait DnsProvider: Send + Sync + std::fmt::Debug {
    /// Find the zone owning `domain`, walking suffixes from most to
    /// least specific: the managed zone may be a parent of the record's
    /// apex.
    async fn resolve_zone(&self, domain: &str, creds: &ProviderCredentials) -> Result<Zone>;

    /// Find the TXT record at `host` (fully qualified), discriminated by
    /// an optional content prefix. A zone root may hold several TXT
    /// records; matching by host alone would pick the wrong one.
    async fn find_record(
        &self,
        zone: &Zone,
        host: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<Option<TxtRecord>>;

    /// Create or update the TXT record at `host`.
    async fn upsert_record(
        &self,
        zone: &Zone,
        host: &str,
        content: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<UpsertOutcome>;
}

/// Candidate zone names for a domain, most specific first.
///
/// `mail.sub.example.com` yields itself, `sub.example.com` and
/// `example.com`; single labels are never valid zones.
pub fn zone_candidates(domain: &str) -> Vec<String> {
    let labels: Vec<&str> = domain.split('.').collect();
    (0..labels.len().saturating_sub(1))
        .map(|i| labels[i..].join("."))
        .collect()
}

/// Content-prefix discrimination for TXT values.
pub fn matches_prefix(content: &str, prefix: Option<&str>) -> bool {
    match prefix {
        Some(prefix) => content.starts_with(prefix),
        None => true,
    }
}

/// Convert a fully-qualified host into the zone-relative form some
/// vendors require; the apex becomes `@`.
pub fn relative_host(host: &str, zone_name: &str) -> String {
    if host == zone_name {
        "@".to_string()
    } else {
        host.strip_suffix(&format!(".{zone_name}"))
            .unwrap_or(host)
            .to_string()
    }
}

/// Map a vendor HTTP status to the shared error taxonomy: auth failures
/// collapse into one provider-agnostic credentials error so raw vendor
/// bodies never reach the caller.
pub fn vendor_error(provider: &str, status: reqwest::StatusCode) -> ConsoleError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ConsoleError::BadCredentials
    } else {
        ConsoleError::Provider(format!("{provider} API returned {status}"))
    }
}

/// Case-insensitive registry of provider implementations.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DnsProvider>>,
}

impl ProviderRegistry {
    /// Registry with every built-in provider registered.
    pub fn new() -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
        };
        registry.register(
            "CLOUDFLAREAPI",
            Arc::new(super::providers::cloudflare::Cloudflare::new()),
        );
        registry.register(
            "DIGITALOCEAN",
            Arc::new(super::providers::digitalocean::DigitalOcean::new()),
        );
        registry.register(
            "HETZNER",
            Arc::new(super::providers::hetzner::Hetzner::new()),
        );
        registry.register("GANDI_V5", Arc::new(super::providers::gandi::Gandi::new()));
        registry
    }

    /// Register or replace a provider implementation.
    pub fn register(&mut self, provider_type: &str, provider: Arc<dyn DnsProvider>) {
        self.providers
            .insert(provider_type.to_ascii_uppercase(), provider);
    }

    /// Look up a provider; unknown types are a user-facing configuration
    /// error naming the unsupported type.
    pub fn get(&self, provider_type: &str) -> Result<Arc<dyn DnsProvider>> {
        self.providers
            .get(&provider_type.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| {
                ConsoleError::invalid(format!("unsupported DNS provider type: {provider_type}"))
            })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_candidates_walk() {
        assert_eq!(
            zone_candidates("mail.sub.example.com"),
            vec!["mail.sub.example.com", "sub.example.com", "example.com"]
        );
        assert_eq!(zone_candidates("example.com"), vec!["example.com"]);
        assert!(zone_candidates("localhost").is_empty());
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("v=spf1 mx -all", Some("v=spf1")));
        assert!(!matches_prefix("google-site-verification=x", Some("v=spf1")));
        assert!(matches_prefix("anything", None));
    }

    #[test]
    fn test_relative_host() {
        assert_eq!(relative_host("example.com", "example.com"), "@");
        assert_eq!(relative_host("_dmarc.example.com", "example.com"), "_dmarc");
        assert_eq!(
            relative_host("mail._domainkey.example.com", "example.com"),
            "mail._domainkey"
        );
    }

    #[test]
    fn test_credentials_require_type() {
        assert!(ProviderCredentials::from_json(serde_json::json!({"apikey": "x"})).is_err());

        let creds =
            ProviderCredentials::from_json(serde_json::json!({"type": "HETZNER", "apikey": "x"}))
                .unwrap();
        assert_eq!(creds.provider_type(), "HETZNER");
        assert_eq!(creds.require("apikey").unwrap(), "x");
        assert!(creds.require("apiuser").unwrap_err().is_caller_error());
    }

    #[test]
    fn test_registry_case_insensitive() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("cloudflareapi").is_ok());
        assert!(registry.get("CloudFlareAPI").is_ok());
    }

    #[test]
    fn test_registry_unknown_type() {
        let registry = ProviderRegistry::new();
        let err = registry.get("ROUTE53").unwrap_err();
        assert!(err.is_caller_error());
        assert!(err.to_string().contains("ROUTE53"));
    }

    #[test]
    fn test_vendor_error_mapping() {
        assert!(matches!(
            vendor_error("cloudflare", reqwest::StatusCode::UNAUTHORIZED),
            ConsoleError::BadCredentials
        ));
        assert!(matches!(
            vendor_error("cloudflare", reqwest::StatusCode::FORBIDDEN),
            ConsoleError::BadCredentials
        ));
        assert!(matches!(
            vendor_error("cloudflare", reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            ConsoleError::Provider(_)
        ));
    }
}
