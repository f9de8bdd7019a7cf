//! DigitalOcean domains API
//!
//! The vendor identifies zones by name and stores record hosts relative
//! to the zone, so fully-qualified callers are translated both ways
//! here. Authentication is a bearer token from the profile's `token`
//! field.

use crate::dns::provider::{
    matches_prefix, relative_host, vendor_error, zone_candidates, DnsProvider,
    ProviderCredentials, TxtRecord, UpsertOutcome, Zone,
};
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE: &str = "https://api.digitalocean.com/v2";
const API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct DigitalOcean {
    http: reqwest::Client,
    api_base: String,
}

impl DigitalOcean {
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
        token: &str,
    ) -> Result<reqwest::Response> {
        let response = builder.bearer_auth(token).timeout(API_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(vendor_error("digitalocean", response.status()));
        }
        Ok(response)
    }
}

impl Default for DigitalOcean {
    fn default() -> Self {
        Self::new()
    }
}

/// Records come back with numeric ids and zone-relative names.
fn parse_record_list(body: &Value, zone_name: &str) -> Vec<TxtRecord> {
    body.get("domain_records")
        .and_then(|r| r.as_array())
        .map(|records| {
            records
                .iter()
                .filter(|record| record.get("type").and_then(|t| t.as_str()) == Some("TXT"))
                .filter_map(|record| {
                    let name = record.get("name")?.as_str()?;
                    let host = if name == "@" {
                        zone_name.to_string()
                    } else {
                        format!("{name}.{zone_name}")
                    };
                    Some(TxtRecord {
                        id: record.get("id")?.as_i64()?.to_string(),
                        host,
                        content: record.get("data")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DnsProvider for DigitalOcean {
    async fn resolve_zone(&self, domain: &str, creds: &ProviderCredentials) -> Result<Zone> {
        let token = creds.require("token")?;
        for candidate in zone_candidates(domain) {
            let response = self
                .http
                .get(format!("{}/domains/{candidate}", self.api_base))
                .bearer_auth(token)
                .timeout(API_TIMEOUT)
                .send()
                .await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !response.status().is_success() {
                return Err(vendor_error("digitalocean", response.status()));
            }
            // The domain name doubles as the zone id on this vendor
            return Ok(Zone {
                id: candidate.clone(),
                name: candidate,
            });
        }
        Err(ConsoleError::Provider(format!(
            "no digitalocean zone found for {domain}"
        )))
    }

    async fn find_record(
        &self,
        zone: &Zone,
        host: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<Option<TxtRecord>> {
        let token = creds.require("token")?;
        let response = self
            .send(
                self.http.get(format!(
                    "{}/domains/{}/records?type=TXT&name={host}",
                    self.api_base, zone.id
                )),
                token,
            )
            .await?;
        let body: Value = response.json().await?;
        Ok(parse_record_list(&body, &zone.name)
            .into_iter()
            .find(|record| {
                record.host == host && matches_prefix(&record.content, content_prefix)
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
        let token = creds.require("token")?;
        let payload = json!({
            "type": "TXT",
            "name": relative_host(host, &zone.name),
            "data": content,
            "ttl": 3600,
        });

        match self.find_record(zone, host, creds, content_prefix).await? {
            Some(existing) => {
                let url = format!(
                    "{}/domains/{}/records/{}",
                    self.api_base, zone.id, existing.id
                );
                self.send(self.http.put(url).json(&payload), token).await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let url = format!("{}/domains/{}/records", self.api_base, zone.id);
                self.send(self.http.post(url).json(&payload), token).await?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}
