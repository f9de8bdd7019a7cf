//! Per-user history filtering
//!
//! A user's mail may arrive under their mailbox address or under any
//! alias that resolves to it. Alias destinations are comma-delimited
//! lists; membership is checked element-wise, never by substring, so
//! `alice@x.com` does not match `xalice@x.com` or another tenant's
//! `alice@x.com.evil.com`.

use crate::spamfilter::client::HistoryRow;
use serde::Serialize;
use std::collections::BTreeSet;

/// One alias mapping: `source` delivers to every address in the
/// comma-delimited `destination` list.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasEntry {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserHistory {
    pub total: usize,
    pub ham: usize,
    pub spam: usize,
    pub average_score: f64,
    pub earliest: Option<i64>,
    /// The ten most recent positive-score entries, newest first.
    pub recent: Vec<HistoryRow>,
}

/// Actions the daemon takes on messages it considers spammy.
const PUNITIVE_ACTIONS: &[&str] = &["reject", "add header", "rewrite subject"];

const RECENT_LIMIT: usize = 10;

/// Collect the address set for a mailbox: the mailbox itself plus every
/// alias source whose destination list contains it.
pub fn address_set(mailbox: &str, aliases: &[AliasEntry]) -> BTreeSet<String> {
    let mailbox = mailbox.trim().to_ascii_lowercase();
    let mut set = BTreeSet::new();
    set.insert(mailbox.clone());

    for alias in aliases {
        let delivers_here = alias
            .destination
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .any(|d| d == mailbox);
        if delivers_here {
            set.insert(alias.source.trim().to_ascii_lowercase());
        }
    }
    set
}

/// Filter a history window down to one user and summarize it.
pub fn summarize(rows: &[HistoryRow], addresses: &BTreeSet<String>) -> UserHistory {
    let mine: Vec<&HistoryRow> = rows
        .iter()
        .filter(|row| {
            row.rcpt_smtp
                .iter()
                .chain(row.rcpt_mime.iter())
                .any(|rcpt| addresses.contains(&rcpt.trim().to_ascii_lowercase()))
        })
        .collect();

    let total = mine.len();
    if total == 0 {
        return UserHistory::default();
    }

    let spam = mine
        .iter()
        .filter(|row| PUNITIVE_ACTIONS.contains(&row.action.as_str()))
        .count();
    let average_score = mine.iter().map(|row| row.score).sum::<f64>() / total as f64;
    let earliest = mine.iter().map(|row| row.unix_time).min();

    let mut recent: Vec<HistoryRow> = mine
        .iter()
        .filter(|row| row.score > 0.0)
        .map(|row| (*row).clone())
        .collect();
    recent.sort_by_key(|row| std::cmp::Reverse(row.unix_time));
    recent.truncate(RECENT_LIMIT);

    UserHistory {
        total,
        ham: total - spam,
        spam,
        average_score,
        earliest,
        recent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(source: &str, destination: &str) -> AliasEntry {
        AliasEntry {
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    fn row(rcpt: &str, action: &str, score: f64, unix_time: i64) -> HistoryRow {
        HistoryRow {
            rcpt_smtp: vec![rcpt.to_string()],
            action: action.to_string(),
            score,
            unix_time,
            ..Default::default()
        }
    }

    #[test]
    fn test_address_set_exact_and_member_matching() {
        let aliases = vec![
            alias("sales@x.com", "alice@x.com"),
            alias("team@x.com", "bob@x.com,alice@x.com"),
            alias("info@x.com", "alice@x.com,carol@x.com"),
            alias("evil@x.com", "alice@x.com.evil.com"),
            alias("close@x.com", "xalice@x.com"),
        ];

        let set = address_set("alice@x.com", &aliases);
        assert!(set.contains("alice@x.com"));
        assert!(set.contains("sales@x.com"));
        assert!(set.contains("team@x.com"));
        assert!(set.contains("info@x.com"));
        // Substring false-positives must not leak other tenants' aliases
        assert!(!set.contains("evil@x.com"));
        assert!(!set.contains("close@x.com"));
    }

    #[test]
    fn test_address_set_case_insensitive() {
        let set = address_set("Alice@X.com", &[alias("Sales@X.COM", "ALICE@x.com")]);
        assert!(set.contains("alice@x.com"));
        assert!(set.contains("sales@x.com"));
    }

    #[test]
    fn test_summarize_filters_and_counts() {
        let rows = vec![
            row("alice@x.com", "no action", -0.5, 100),
            row("alice@x.com", "reject", 15.0, 200),
            row("alice@x.com", "add header", 6.0, 300),
            row("bob@x.com", "reject", 20.0, 400), // someone else's mail
        ];
        let set = address_set("alice@x.com", &[]);
        let summary = summarize(&rows, &set);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.spam, 2);
        assert_eq!(summary.ham, 1);
        assert!((summary.average_score - (20.5 / 3.0)).abs() < 1e-9);
        assert_eq!(summary.earliest, Some(100));
    }

    #[test]
    fn test_recent_is_positive_scores_newest_first() {
        let mut rows: Vec<HistoryRow> = (0..15)
            .map(|i| row("alice@x.com", "no action", 1.0 + i as f64, 1000 + i))
            .collect();
        rows.push(row("alice@x.com", "no action", -2.0, 5000)); // clean, excluded

        let set = address_set("alice@x.com", &[]);
        let summary = summarize(&rows, &set);

        assert_eq!(summary.recent.len(), 10);
        assert_eq!(summary.recent[0].unix_time, 1014);
        assert_eq!(summary.recent[9].unix_time, 1005);
        assert!(summary.recent.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn test_mime_recipients_also_match() {
        let r = HistoryRow {
            rcpt_mime: vec!["alice@x.com".to_string()],
            score: 2.0,
            action: "no action".to_string(),
            unix_time: 7,
            ..Default::default()
        };
        let set = address_set("alice@x.com", &[]);
        assert_eq!(summarize(&[r], &set).total, 1);
    }

    #[test]
    fn test_no_matches() {
        let rows = vec![row("bob@x.com", "reject", 10.0, 1)];
        let set = address_set("alice@x.com", &[]);
        assert_eq!(summarize(&rows, &set), UserHistory::default());
    }
}
