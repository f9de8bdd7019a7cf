//! console-rs: mail-appliance integration core
//!
//! Backend core for a dockerized mail-stack console: it stores tenant
//! settings encrypted at rest, pulls live state out of the running
//! containers, reconciles Bayes training, and publishes the DNS records
//! a mail domain needs.
//!
//! # Features
//!
//! - **Settings store**: multi-tenant key/value store over SQLite with
//!   AES-256-GCM encryption for secret values
//! - **State pulling**: environment, DKIM and resource snapshots pulled
//!   through a remote-execution facade
//! - **Spam-filter integration**: statistics, history filtering and a
//!   Bayes train/untrain state machine against the filter daemon
//! - **DNS**: multi-vendor TXT publishing plus authoritative-record and
//!   blacklist health reports
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`settings`]: Encrypted settings store and target resolution
//! - [`exec`]: Remote-execution facade
//! - [`parsers`]: Config-dump and monitor-output parsers
//! - [`stack`]: Mail-stack state pulling
//! - [`spamfilter`]: Spam-filter daemon integration
//! - [`dns`]: DNS providers, publishing and health checks
//! - [`utils`]: Validation and shell-quoting helpers

pub mod config;
pub mod dns;
pub mod error;
pub mod exec;
pub mod parsers;
pub mod rate_limit;
pub mod reply;
pub mod settings;
pub mod spamfilter;
pub mod stack;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConsoleError, Result};
pub use reply::Reply;
