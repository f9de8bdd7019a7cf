//! Cloudflare zone API
//!
//! Hosts are fully qualified on the wire, so they pass through
//! unchanged. Authentication is a bearer token from the profile's
//! `apitoken` field.

use crate::dns::provider::{
    matches_prefix, vendor_error, zone_candidates, DnsProvider, ProviderCredentials, TxtRecord,
    UpsertOutcome, Zone,
};
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.cloudflare.com/client/v4";
const API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Cloudflare {
    http: reqwest::Client,
    api_base: String,
}

impl Cloudflare {
    pub fn new() -> Self {
        Self::with_base(API_BASE)
    }

    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    async fn get(&self, path: &str, token: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .timeout(API_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(vendor_error("cloudflare", response.status()));
        }
        Ok(response.json().await?)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, token: &str) -> Result<()> {
        let response = builder.bearer_auth(token).timeout(API_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(vendor_error("cloudflare", response.status()));
        }
        Ok(())
    }
}

impl Default for Cloudflare {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `{id, name}` pairs from a zone listing body.
fn parse_zone_list(body: &Value) -> Vec<Zone> {
    body.get("result")
        .and_then(|r| r.as_array())
        .map(|zones| {
            zones
                .iter()
                .filter_map(|zone| {
                    Some(Zone {
                        id: zone.get("id")?.as_str()?.to_string(),
                        name: zone.get("name")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_record_list(body: &Value) -> Vec<TxtRecord> {
    body.get("result")
        .and_then(|r| r.as_array())
        .map(|records| {
            records
                .iter()
                .filter_map(|record| {
                    Some(TxtRecord {
                        id: record.get("id")?.as_str()?.to_string(),
                        host: record.get("name")?.as_str()?.to_string(),
                        content: record.get("content")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DnsProvider for Cloudflare {
    async fn resolve_zone(&self, domain: &str, creds: &ProviderCredentials) -> Result<Zone> {
        let token = creds.require("apitoken")?;
        for candidate in zone_candidates(domain) {
            let body = self.get(&format!("/zones?name={candidate}"), token).await?;
            if let Some(zone) = parse_zone_list(&body).into_iter().next() {
                debug!(domain, zone = %zone.name, "resolved cloudflare zone");
                return Ok(zone);
            }
        }
        Err(ConsoleError::Provider(format!(
            "no cloudflare zone found for {domain}"
        )))
    }

    async fn find_record(
        &self,
        zone: &Zone,
        host: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<Option<TxtRecord>> {
        let token = creds.require("apitoken")?;
        let body = self
            .get(
                &format!("/zones/{}/dns_records?type=TXT&name={host}", zone.id),
                token,
            )
            .await?;
        Ok(parse_record_list(&body)
            .into_iter()
            .find(|record| matches_prefix(&record.content, content_prefix)))
    }

    async fn upsert_record(
        &self,
        zone: &Zone,
        host: &str,
        content: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<UpsertOutcome> {
        let token = creds.require("apitoken")?;
        let payload = json!({
            "type": "TXT",
            "name": host,
            "content": content,
            "ttl": 1,
        });

        match self.find_record(zone, host, creds, content_prefix).await? {
            Some(existing) => {
                let url = format!(
                    "{}/zones/{}/dns_records/{}",
                    self.api_base, zone.id, existing.id
                );
                self.send(self.http.put(url).json(&payload), token).await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let url = format!("{}/zones/{}/dns_records", self.api_base, zone.id);
                self.send(self.http.post(url).json(&payload), token).await?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zone_list() {
        let body = json!({"result": [{"id": "abc123", "name": "example.com"}]});
        let zones = parse_zone_list(&body);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].id, "abc123");
        assert_eq!(zones[0].name, "example.com");

        assert!(parse_zone_list(&json!({"result": []})).is_empty());
        assert!(parse_zone_list(&json!({"errors": ["x"]})).is_empty());
    }

    #[test]
    fn test_parse_record_list_skips_malformed() {
        let body = json!({"result": [
            {"id": "r1", "name": "example.com", "content": "v=spf1 mx -all"},
            {"id": "r2", "name": "example.com"},
        ]});
        let records = parse_record_list(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "v=spf1 mx -all");
    }
}
