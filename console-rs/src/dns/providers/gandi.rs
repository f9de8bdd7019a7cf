//! Gandi LiveDNS API
//!
//! LiveDNS has no per-record ids: TXT values at one host live in a
//! single rrset, so an upsert rewrites the whole value list, replacing
//! the value that matches the content prefix and keeping the rest.
//! Authentication is the `Apikey` scheme from the profile's `apikey`
//! field. Values come back quoted on the wire.

use crate::dns::provider::{
    matches_prefix, relative_host, vendor_error, zone_candidates, DnsProvider,
    ProviderCredentials, TxtRecord, UpsertOutcome, Zone,
};
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE: &str = "https://api.gandi.net/v5";
const API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Gandi {
    http: reqwest::Client,
    api_base: String,
}

impl Gandi {
    pub fn new() -> Self {
        Self::with_base(API_BASE)
    }

    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        apikey: &str,
    ) -> Result<reqwest::Response> {
        let response = builder
            .header("Authorization", format!("Apikey {apikey}"))
            .timeout(API_TIMEOUT)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(response);
        }
        if !response.status().is_success() {
            return Err(vendor_error("gandi", response.status()));
        }
        Ok(response)
    }

    /// Fetch the TXT rrset values at a host, empty when the rrset does
    /// not exist yet.
    async fn rrset_values(&self, zone: &Zone, host: &str, apikey: &str) -> Result<Vec<String>> {
        let relative = relative_host(host, &zone.name);
        let url = format!(
            "{}/livedns/domains/{}/records/{relative}/TXT",
            self.api_base, zone.name
        );
        let response = self.send(self.http.get(url), apikey).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body: Value = response.json().await?;
        Ok(parse_rrset_values(&body))
    }

    async fn put_rrset(
        &self,
        zone: &Zone,
        host: &str,
        values: &[String],
        apikey: &str,
    ) -> Result<()> {
        let relative = relative_host(host, &zone.name);
        let url = format!(
            "{}/livedns/domains/{}/records/{relative}/TXT",
            self.api_base, zone.name
        );
        let payload = json!({ "rrset_ttl": 3600, "rrset_values": values });
        self.send(self.http.put(url).json(&payload), apikey).await?;
        Ok(())
    }
}

impl Default for Gandi {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_rrset_values(body: &Value) -> Vec<String> {
    body.get("rrset_values")
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str())
                .map(unquote_value)
                .collect()
        })
        .unwrap_or_default()
}

/// LiveDNS wraps TXT values in double quotes; strip one balanced pair.
fn unquote_value(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

#[async_trait]
impl DnsProvider for Gandi {
    async fn resolve_zone(&self, domain: &str, creds: &ProviderCredentials) -> Result<Zone> {
        let apikey = creds.require("apikey")?;
        for candidate in zone_candidates(domain) {
            let url = format!("{}/livedns/domains/{candidate}", self.api_base);
            let response = self.send(self.http.get(url), apikey).await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            return Ok(Zone {
                id: candidate.clone(),
                name: candidate,
            });
        }
        Err(ConsoleError::Provider(format!(
            "no gandi zone found for {domain}"
        )))
    }

    async fn find_record(
        &self,
        zone: &Zone,
        host: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<Option<TxtRecord>> {
        let apikey = creds.require("apikey")?;
        let values = self.rrset_values(zone, host, apikey).await?;
        Ok(values
            .into_iter()
            .find(|value| matches_prefix(value, content_prefix))
            .map(|content| TxtRecord {
                // rrsets have no ids; the relative host stands in
                id: relative_host(host, &zone.name),
                host: host.to_string(),
                content,
            }))
    }

    async fn upsert_record(
        &self,
        zone: &Zone,
        host: &str,
        content: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<UpsertOutcome> {
        let apikey = creds.require("apikey")?;
        let mut values = self.rrset_values(zone, host, apikey).await?;

        let outcome = match values
            .iter()
            .position(|value| matches_prefix(value, content_prefix))
        {
            Some(index) => {
                values[index] = content.to_string();
                UpsertOutcome::Updated
            }
            None => {
                values.push(content.to_string());
                UpsertOutcome::Created
            }
        };
        self.put_rrset(zone, host, &values, apikey).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rrset_values_unquotes() {
        let body = json!({"rrset_values": ["\"v=spf1 mx -all\"", "plain"]});
        assert_eq!(parse_rrset_values(&body), vec!["v=spf1 mx -all", "plain"]);
    }

    #[test]
    fn test_unquote_only_balanced() {
        assert_eq!(unquote_value("\"a\""), "a");
        assert_eq!(unquote_value("\"a"), "\"a");
        assert_eq!(unquote_value("a"), "a");
    }
}
