//! Per-symbol impact aggregation
//!
//! A symbol that fires with positive scores in some messages and
//! negative scores in others gets two output rows, one per polarity,
//! each independently averaged and frequency-normalized against the
//! total message count.

use crate::spamfilter::client::HistoryRow;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolAggregate {
    pub symbol: String,
    pub polarity: Polarity,
    pub hits: usize,
    /// Mean score across this polarity's hits.
    pub average: f64,
    /// Hits divided by total message count.
    pub frequency: f64,
}

/// Aggregate symbol hits across a history window.
///
/// Output is sorted by descending absolute average score. Zero scores
/// count as positive, so a symbol never vanishes from the aggregate.
pub fn aggregate_symbols(rows: &[HistoryRow]) -> Vec<SymbolAggregate> {
    let total = rows.len();
    if total == 0 {
        return Vec::new();
    }

    let mut buckets: BTreeMap<(String, Polarity), (usize, f64)> = BTreeMap::new();
    for row in rows {
        for (symbol, hit) in &row.symbols {
            let polarity = if hit.score < 0.0 {
                Polarity::Negative
            } else {
                Polarity::Positive
            };
            let entry = buckets.entry((symbol.clone(), polarity)).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += hit.score;
        }
    }

    let mut aggregates: Vec<SymbolAggregate> = buckets
        .into_iter()
        .map(|((symbol, polarity), (hits, sum))| SymbolAggregate {
            symbol,
            polarity,
            hits,
            average: sum / hits as f64,
            frequency: hits as f64 / total as f64,
        })
        .collect();

    aggregates.sort_by(|a, b| {
        b.average
            .abs()
            .partial_cmp(&a.average.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    aggregates
}
