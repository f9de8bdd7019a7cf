//! Encrypted, multi-tenant settings store
//!
//! Typed key/value configuration scoped by (plugin, schema, scope,
//! container), with symmetric encryption for secrets and resolution of a
//! container's settings into an ephemeral remote target descriptor.

pub mod crypto;
pub mod store;
pub mod target;

pub use crypto::SettingsCipher;
pub use store::{SettingEntry, SettingsStore};
pub use target::{Target, TargetResolver};
