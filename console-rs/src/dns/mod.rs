//! DNS publishing and health checking
//!
//! A provider abstraction over multiple vendor zone APIs for idempotent
//! TXT upserts, plus authoritative-record enumeration and blacklist
//! probing for the managed domains.

pub mod blacklist;
pub mod health;
pub mod provider;
pub mod providers;
pub mod public_ip;
pub mod publisher;

pub use provider::{
    DnsProvider, ProviderCredentials, ProviderRegistry, TxtRecord, UpsertOutcome, Zone,
};
pub use publisher::DnsPublisher;
