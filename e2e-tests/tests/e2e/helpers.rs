//! Shared fixtures for the end-to-end scenarios
#![allow(dead_code)]

use async_trait::async_trait;
use console_rs::dns::provider::{
    matches_prefix, zone_candidates, DnsProvider, ProviderCredentials, TxtRecord, UpsertOutcome,
    Zone,
};
use console_rs::error::{ConsoleError, Result};
use console_rs::settings::target::Target;
use console_rs::settings::{SettingsCipher, SettingsStore};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Mutex;
use std::time::Duration;

pub const SECRET: &str = "e2e-settings-secret";

pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

pub async fn settings_store(pool: SqlitePool) -> SettingsStore {
    let store = SettingsStore::new(pool, SettingsCipher::new(SECRET).unwrap());
    store.init_db().await.unwrap();
    store
}

pub fn target(container: &str) -> Target {
    Target {
        container: container.to_string(),
        host: container.to_string(),
        port: 11334,
        scheme: "http".to_string(),
        auth_token: Some("e2e-key".to_string()),
        timeout: Duration::from_secs(5),
    }
}

/// In-memory vendor double: one zone, records behind a mutex, ids
/// handed out sequentially. Registered over a real provider type so the
/// full publish path runs without any network.
#[derive(Debug)]
pub struct MemoryDnsProvider {
    zone: Zone,
    records: Mutex<Vec<TxtRecord>>,
    next_id: Mutex<u64>,
}

impl MemoryDnsProvider {
    pub fn with_zone(id: &str, name: &str) -> Self {
        Self {
            zone: Zone {
                id: id.to_string(),
                name: name.to_string(),
            },
            records: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn seed(&self, host: &str, content: &str) {
        let id = self.take_id();
        self.records.lock().unwrap().push(TxtRecord {
            id,
            host: host.to_string(),
            content: content.to_string(),
        });
    }

    pub fn records(&self) -> Vec<TxtRecord> {
        self.records.lock().unwrap().clone()
    }

    fn take_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        let id = format!("rec-{next}");
        *next += 1;
        id
    }
}

#[async_trait]
impl DnsProvider for MemoryDnsProvider {
    async fn resolve_zone(&self, domain: &str, _creds: &ProviderCredentials) -> Result<Zone> {
        zone_candidates(domain)
            .into_iter()
            .find(|candidate| *candidate == self.zone.name)
            .map(|_| self.zone.clone())
            .ok_or_else(|| ConsoleError::Provider(format!("no zone found for {domain}")))
    }

    async fn find_record(
        &self,
        _zone: &Zone,
        host: &str,
        _creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<Option<TxtRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.host == host && matches_prefix(&record.content, content_prefix))
            .cloned())
    }

    async fn upsert_record(
        &self,
        zone: &Zone,
        host: &str,
        content: &str,
        creds: &ProviderCredentials,
        content_prefix: Option<&str>,
    ) -> Result<UpsertOutcome> {
        let existing = self.find_record(zone, host, creds, content_prefix).await?;
        let mut records = self.records.lock().unwrap();
        match existing {
            Some(found) => {
                for record in records.iter_mut() {
                    if record.id == found.id {
                        record.content = content.to_string();
                    }
                }
                Ok(UpsertOutcome::Updated)
            }
            None => {
                drop(records);
                self.seed(host, content);
                Ok(UpsertOutcome::Created)
            }
        }
    }
}
