//! Persistence for the settings store
//!
//! Two tables: `configs` identifies a named configuration unit per
//! (plugin, schema, scope, name) and `settings` holds one row per
//! (config_id, name). Mutable settings are user-editable; immutable ones
//! are machine-pulled facts replaced wholesale on every refresh.

use crate::error::{ConsoleError, Result};
use crate::settings::crypto::SettingsCipher;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// One named setting in a save batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingEntry {
    pub name: String,
    pub value: String,
}

impl SettingEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub struct SettingsStore {
    db: SqlitePool,
    cipher: SettingsCipher,
}

impl SettingsStore {
    pub fn new(db: SqlitePool, cipher: SettingsCipher) -> Self {
        Self { db, cipher }
    }

    /// Initialize database tables.
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS configs (
                id TEXT PRIMARY KEY,
                plugin TEXT NOT NULL,
                schema TEXT NOT NULL,
                scope TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(plugin, schema, scope, name)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                config_id TEXT NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                is_mutable INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (config_id, name)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Save a batch of user-editable settings, all-or-nothing.
    ///
    /// The config row is created on first save for a new container via a
    /// single atomic upsert, so concurrent first-writers for the same
    /// container cannot race into duplicate rows.
    pub async fn save_settings(
        &self,
        plugin: &str,
        schema: &str,
        scope: &str,
        container: &str,
        entries: &[SettingEntry],
        encrypted: bool,
    ) -> Result<()> {
        self.write_batch(plugin, schema, scope, container, entries, encrypted, true)
            .await
    }

    /// Replace the machine-pulled settings for a container.
    ///
    /// Immutable rows are delete-then-insert replaced, never merged: a
    /// variable that disappeared from the remote environment must also
    /// disappear here.
    pub async fn replace_pulled(
        &self,
        plugin: &str,
        schema: &str,
        scope: &str,
        container: &str,
        entries: &[SettingEntry],
    ) -> Result<()> {
        self.write_batch(plugin, schema, scope, container, entries, false, false)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_batch(
        &self,
        plugin: &str,
        schema: &str,
        scope: &str,
        container: &str,
        entries: &[SettingEntry],
        encrypted: bool,
        mutable: bool,
    ) -> Result<()> {
        for (field, value) in [
            ("plugin", plugin),
            ("schema", schema),
            ("scope", scope),
            ("container", container),
        ] {
            if value.is_empty() {
                return Err(ConsoleError::invalid(format!(
                    "missing required field: {field}"
                )));
            }
        }

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO configs (id, plugin, schema, scope, name)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(plugin, schema, scope, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(plugin)
        .bind(schema)
        .bind(scope)
        .bind(container)
        .execute(&mut *tx)
        .await?;

        let (config_id,): (String,) = sqlx::query_as(
            "SELECT id FROM configs WHERE plugin = ? AND schema = ? AND scope = ? AND name = ?",
        )
        .bind(plugin)
        .bind(schema)
        .bind(scope)
        .bind(container)
        .fetch_one(&mut *tx)
        .await?;

        if !mutable {
            sqlx::query("DELETE FROM settings WHERE config_id = ? AND is_mutable = 0")
                .bind(&config_id)
                .execute(&mut *tx)
                .await?;
        }

        for entry in entries {
            let stored = if encrypted {
                self.cipher.encrypt(&entry.value)?
            } else {
                entry.value.clone()
            };

            sqlx::query(
                r#"
                INSERT INTO settings (config_id, name, value, is_mutable)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(config_id, name) DO UPDATE SET
                    value = excluded.value,
                    is_mutable = excluded.is_mutable
                "#,
            )
            .bind(&config_id)
            .bind(&entry.name)
            .bind(&stored)
            .bind(mutable as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            "Saved {} setting(s) for {}/{} ({})",
            entries.len(),
            plugin,
            container,
            if mutable { "mutable" } else { "pulled" }
        );
        Ok(())
    }

    /// Fetch one setting value for a container.
    pub async fn get_setting(
        &self,
        plugin: &str,
        container: &str,
        name: &str,
        encrypted: bool,
    ) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT s.value FROM settings s
            JOIN configs c ON c.id = s.config_id
            WHERE c.plugin = ? AND c.name = ? AND s.name = ?
            "#,
        )
        .bind(plugin)
        .bind(container)
        .bind(name)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some((value,)) if encrypted => Ok(Some(self.cipher.decrypt(&value)?)),
            Some((value,)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    /// Fetch all settings for a (plugin, container) pair.
    pub async fn get_settings(&self, plugin: &str, container: &str) -> Result<Vec<SettingEntry>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT s.name, s.value FROM settings s
            JOIN configs c ON c.id = s.config_id
            WHERE c.plugin = ? AND c.name = ?
            ORDER BY s.name
            "#,
        )
        .bind(plugin)
        .bind(container)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, value)| SettingEntry { name, value })
            .collect())
    }
}
