//! Spam-filter integration
//!
//! Statistics retrieval over the control channel, symbol-impact
//! aggregation, per-user history filtering and the Bayes train/untrain
//! reconciliation state machine.

pub mod bayes;
pub mod client;
pub mod history;
pub mod stats;

pub use bayes::{BayesJournal, BayesTrainer, LearnAction};
pub use client::{ControlStatus, FilterClient, HistoryRow};
pub use history::{AliasEntry, UserHistory};
pub use stats::SymbolAggregate;
