//! Domain registry persistence
//!
//! One row per mail domain, upserted whenever DKIM discovery or
//! generation runs. Rows are never deleted automatically, so repeated
//! pulls against an unchanged remote are merge-stable.

use crate::error::{ConsoleError, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub name: String,
    pub container: String,
    pub dkim_selector: String,
    pub key_type: String,
    pub key_size: Option<String>,
    pub key_path: String,
}

pub struct DomainRegistry {
    db: SqlitePool,
}

impl DomainRegistry {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize database tables.
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domains (
                name TEXT PRIMARY KEY,
                container TEXT NOT NULL,
                dkim_selector TEXT NOT NULL,
                key_type TEXT NOT NULL,
                key_size TEXT,
                key_path TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Upsert one domain row, keyed by domain name.
    pub async fn upsert(&self, record: &DomainRecord) -> Result<()> {
        crate::utils::validate::domain(&record.name)?;
        crate::utils::validate::selector(&record.dkim_selector)?;

        match record.key_type.as_str() {
            "rsa" => {
                let numeric = record
                    .key_size
                    .as_deref()
                    .is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));
                if !numeric {
                    return Err(ConsoleError::invalid(format!(
                        "rsa key for {} requires a numeric key size",
                        record.name
                    )));
                }
            }
            "ed25519" => {}
            other => {
                return Err(ConsoleError::invalid(format!(
                    "unsupported key type: {other}"
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO domains (name, container, dkim_selector, key_type, key_size, key_path, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                container = excluded.container,
                dkim_selector = excluded.dkim_selector,
                key_type = excluded.key_type,
                key_size = excluded.key_size,
                key_path = excluded.key_path,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.name)
        .bind(&record.container)
        .bind(&record.dkim_selector)
        .bind(&record.key_type)
        .bind(&record.key_size)
        .bind(&record.key_path)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        debug!(
            "Upserted domain {} (selector {}, {})",
            record.name, record.dkim_selector, record.key_type
        );
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<DomainRecord>> {
        let row: Option<(String, String, String, String, Option<String>, String)> =
            sqlx::query_as(
                "SELECT name, container, dkim_selector, key_type, key_size, key_path FROM domains WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(
            |(name, container, dkim_selector, key_type, key_size, key_path)| DomainRecord {
                name,
                container,
                dkim_selector,
                key_type,
                key_size,
                key_path,
            },
        ))
    }

    pub async fn list(&self) -> Result<Vec<DomainRecord>> {
        let rows: Vec<(String, String, String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT name, container, dkim_selector, key_type, key_size, key_path FROM domains ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(name, container, dkim_selector, key_type, key_size, key_path)| DomainRecord {
                    name,
                    container,
                    dkim_selector,
                    key_type,
                    key_size,
                    key_path,
                },
            )
            .collect())
    }
}
