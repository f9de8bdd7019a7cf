//! Hetzner DNS API
//!
//! Zones are listed by name, records are zone-relative and filtered
//! client-side since the records endpoint only scopes by zone id.
//! Authentication is the `Auth-API-Token` header from the profile's
//! `apikey` field.

use crate::dns::provider::{
    matches_prefix, relative_host, vendor_error, zone_candidates, DnsProvider,
    ProviderCredentials, TxtRecord, UpsertOutcome, Zone,
};
use crate::error::{ConsoleError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE: &str = "https://dns.hetzner.com/api/v1";
const API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Hetzner {
    http: reqwest::Client,
    api_base: String,
}

impl Hetzner {
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
        let response = builder
            .header("Auth-API-Token", token)
            .timeout(API_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(vendor_error("hetzner", response.status()));
        }
        Ok(response)
    }
}

impl Default for Hetzner {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_zone_list(body: &Value) -> Vec<Zone> {
    body.get("zones")
        .and_then(|z| z.as_array())
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

fn parse_record_list(body: &Value, zone_name: &str) -> Vec<TxtRecord> {
    body.get("records")
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
                        id: record.get("id")?.as_str()?.to_string(),
                        host,
                        content: record.get("value")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DnsProvider for Hetzner {
    async fn resolve_zone(&self, domain: &str, creds: &ProviderCredentials) -> Result<Zone> {
        let token = creds.require("apikey")?;
        for candidate in zone_candidates(domain) {
            let response = self
                .send(
                    self.http
                        .get(format!("{}/zones?name={candidate}", self.api_base)),
                    token,
                )
                .await?;
            let body: Value = response.json().await?;
            if let Some(zone) = parse_zone_list(&body)
                .into_iter()
                .find(|zone| zone.name == candidate)
            {
                return Ok(zone);
            }
        }
        Err(ConsoleError::Provider(format!(
            "no hetzner zone found for {domain}"
        )))
    }

    async fn find_record(
        &self,
        zone: &Zone,
        host: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<Option<TxtRecord>> {
        let token = creds.require("apikey")?;
        let response = self
            .send(
                self.http
                    .get(format!("{}/records?zone_id={}", self.api_base, zone.id)),
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
        let token = creds.require("apikey")?;
        let payload = json!({
            "zone_id": zone.id,
            "type": "TXT",
            "name": relative_host(host, &zone.name),
            "value": content,
        });

        match self.find_record(zone, host, creds, content_prefix).await? {
            Some(existing) => {
                let url = format!("{}/records/{}", self.api_base, existing.id);
                self.send(self.http.put(url).json(&payload), token).await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let url = format!("{}/records", self.api_base);
                self.send(self.http.post(url).json(&payload), token).await?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}
