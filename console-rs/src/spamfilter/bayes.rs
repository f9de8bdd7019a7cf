//! Bayes training reconciliation
//!
//! One logical journal row per message id. Re-classifying a message must
//! unlearn the previous action before learning the new one; learning on
//! top of stale evidence corrupts the classifier's statistics. The
//! journal is only updated after the remote learn call succeeds, so a
//! remote failure can never desync local state.

use crate::error::{ConsoleError, Result};
use crate::exec::{ExecOpts, RemoteShell};
use crate::settings::target::Target;
use crate::utils::{shell, validate};
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for the full-mailbox search, which may scan every mailbox.
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnAction {
    Ham,
    Spam,
}

impl LearnAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearnAction::Ham => "ham",
            LearnAction::Spam => "spam",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ham" => Ok(LearnAction::Ham),
            "spam" => Ok(LearnAction::Spam),
            other => Err(ConsoleError::invalid(format!(
                "unknown learn action: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BayesRecord {
    pub message_id: String,
    pub action: LearnAction,
    pub user: String,
    pub learned_by: String,
    pub learned_at: String,
}

/// Persisted per-message training journal.
pub struct BayesJournal {
    db: SqlitePool,
}

impl BayesJournal {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize database tables.
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bayes_learned (
                message_id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                user TEXT NOT NULL,
                learned_by TEXT NOT NULL,
                learned_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Last recorded action for a message id.
    pub async fn get(&self, message_id: &str) -> Result<Option<BayesRecord>> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT action, user, learned_by, learned_at FROM bayes_learned WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some((action, user, learned_by, learned_at)) => Ok(Some(BayesRecord {
                message_id: message_id.to_string(),
                action: LearnAction::parse(&action)?,
                user,
                learned_by,
                learned_at,
            })),
            None => Ok(None),
        }
    }

    /// Record the latest action for a message id, replacing any prior row.
    pub async fn record(
        &self,
        message_id: &str,
        action: LearnAction,
        user: &str,
        learned_by: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bayes_learned (message_id, action, user, learned_by, learned_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(message_id) DO UPDATE SET
                action = excluded.action,
                user = excluded.user,
                learned_by = excluded.learned_by,
                learned_at = excluded.learned_at
            "#,
        )
        .bind(message_id)
        .bind(action.as_str())
        .bind(user)
        .bind(learned_by)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Identifying triple of a located message.
///
/// Comes back from the remote search and crosses the shell-execution
/// boundary again in follow-on commands, so every field is validated
/// against a strict pattern before use.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLocation {
    pub user: String,
    pub guid: String,
    pub uid: String,
}

/// Per-identity training counters pulled from the key/value cache.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct IdentityCounts {
    pub identity: String,
    pub ham: u64,
    pub spam: u64,
}

pub struct BayesTrainer<'a> {
    shell: &'a dyn RemoteShell,
    journal: &'a BayesJournal,
    search_timeout: Duration,
}

impl<'a> BayesTrainer<'a> {
    pub fn new(shell: &'a dyn RemoteShell, journal: &'a BayesJournal) -> Self {
        Self {
            shell,
            journal,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    /// Override the mailbox-search timeout, typically from
    /// `control.search_timeout_secs` in the application config.
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Train a message as ham or spam, reconciling against the journal.
    ///
    /// No prior record: single learn call. Same action: learn again (the
    /// daemon reporting "already learned" is a success). Different
    /// action: unlearn the previous action first, then learn, then
    /// persist. The journal is untouched if the remote learn fails.
    pub async fn train(
        &self,
        target: &Target,
        message_id: &str,
        action: LearnAction,
        learned_by: &str,
    ) -> Result<()> {
        validate::message_id(message_id)?;

        let location = self.locate(target, message_id).await?;
        let prior = self.journal.get(message_id).await?;

        if let Some(prior) = &prior {
            if prior.action != action {
                info!(
                    "Re-classifying {message_id}: unlearning {} before learning {}",
                    prior.action.as_str(),
                    action.as_str()
                );
                self.issue(target, &location, prior.action, true).await?;
            } else {
                debug!(
                    "{message_id} already recorded as {}, re-learning",
                    action.as_str()
                );
            }
        }

        self.issue(target, &location, action, false).await?;

        self.journal
            .record(message_id, action, &location.user, learned_by)
            .await
    }

    /// Locate a message by its Message-ID header across all mailboxes.
    async fn locate(&self, target: &Target, message_id: &str) -> Result<MessageLocation> {
        let command = format!(
            "doveadm search -A HEADER Message-ID {}",
            shell::quote(message_id)
        );
        let output = self
            .shell
            .exec_command(&command, target, ExecOpts::with_timeout(self.search_timeout))
            .await?;

        if !output.success() {
            return Err(ConsoleError::Exec(format!(
                "message search failed: {}",
                output.stderr.trim()
            )));
        }

        let line = output
            .stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| {
                ConsoleError::invalid(format!("message {message_id} not found in any mailbox"))
            })?;

        let mut parts = line.split_whitespace();
        let (Some(user), Some(guid), Some(uid)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ConsoleError::Exec(format!(
                "unexpected search output: {line}"
            )));
        };

        validate::email(user)?;
        validate::mailbox_guid(guid)?;
        validate::message_uid(uid)?;

        Ok(MessageLocation {
            user: user.to_string(),
            guid: guid.to_string(),
            uid: uid.to_string(),
        })
    }

    /// Issue one learn or unlearn call for a located message.
    async fn issue(
        &self,
        target: &Target,
        location: &MessageLocation,
        action: LearnAction,
        unlearn: bool,
    ) -> Result<()> {
        let verb = if unlearn { "unlearn" } else { "learn" };
        let password = match &target.auth_token {
            Some(token) => format!(" -P {}", shell::quote(token)),
            None => String::new(),
        };
        let command = format!(
            "doveadm fetch -u {} text mailbox-guid {} uid {} | rspamc -h {}:{}{password} {verb}_{}",
            shell::quote(&location.user),
            shell::quote(&location.guid),
            shell::quote(&location.uid),
            target.host,
            target.port,
            action.as_str(),
        );

        let output = self
            .shell
            .exec_command(&command, target, ExecOpts::default())
            .await?;

        let already = output.stdout.contains("already learned")
            || output.stderr.contains("already learned");
        if output.success() || (!unlearn && already) {
            if already {
                debug!("daemon reports message already learned as {}", action.as_str());
            }
            Ok(())
        } else {
            Err(ConsoleError::Exec(format!(
                "{verb} {} failed: {}",
                action.as_str(),
                if output.stderr.trim().is_empty() {
                    output.stdout.trim()
                } else {
                    output.stderr.trim()
                }
            )))
        }
    }
}

/// Pull per-identity training counters from the key/value cache.
///
/// Keys look like `BAYES_HAM_<identity>` / `BAYES_SPAM_<identity>`.
/// Only email-shaped identities are reported; hashed per-message
/// variants (32-hex blobs) are excluded.
pub async fn identity_counts(
    shell: &dyn RemoteShell,
    target: &Target,
) -> Result<Vec<IdentityCounts>> {
    let output = shell
        .exec_command(
            "redis-cli --scan --pattern 'BAYES_*'",
            target,
            ExecOpts::default(),
        )
        .await?;

    if !output.success() {
        return Err(ConsoleError::Exec(format!(
            "cache scan failed: {}",
            output.stderr.trim()
        )));
    }

    let mut counts: std::collections::BTreeMap<String, IdentityCounts> = Default::default();
    for key in output.stdout.lines() {
        let key = key.trim();
        let (spam, identity) = if let Some(rest) = key.strip_prefix("BAYES_SPAM_") {
            (true, rest)
        } else if let Some(rest) = key.strip_prefix("BAYES_HAM_") {
            (false, rest)
        } else {
            continue;
        };

        if !validate::is_email(identity) || validate::is_hex_guid(identity) {
            debug!("Skipping non-identity cache key: {key}");
            continue;
        }

        let learns = match fetch_learns(shell, target, key).await {
            Ok(learns) => learns,
            Err(e) => {
                warn!("Counter fetch for {key} failed: {e}");
                continue;
            }
        };

        let entry = counts
            .entry(identity.to_string())
            .or_insert_with(|| IdentityCounts {
                identity: identity.to_string(),
                ..Default::default()
            });
        if spam {
            entry.spam = learns;
        } else {
            entry.ham = learns;
        }
    }

    Ok(counts.into_values().collect())
}

async fn fetch_learns(shell: &dyn RemoteShell, target: &Target, key: &str) -> Result<u64> {
    let output = shell
        .exec_command(
            &format!("redis-cli HGET {} learns", shell::quote(key)),
            target,
            ExecOpts::default(),
        )
        .await?;

    if !output.success() {
        return Err(ConsoleError::Exec(output.stderr.trim().to_string()));
    }
    Ok(output.stdout.trim().parse().unwrap_or(0))
}
