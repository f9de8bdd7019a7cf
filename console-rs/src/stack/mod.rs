//! Mail-stack state pulling
//!
//! Orchestrates the execution facade and the config-text parsers to
//! produce a flattened environment snapshot, discover per-domain DKIM
//! signing state and collect resource usage.

pub mod dkim;
pub mod domains;
pub mod envs;
pub mod resources;

pub use domains::{DomainRecord, DomainRegistry};
pub use envs::pull_server_envs;
pub use resources::{pull_resources, ResourceSnapshot};
