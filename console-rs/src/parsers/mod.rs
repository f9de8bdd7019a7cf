//! Parsers for the semi-structured text the remote daemons expose
//!
//! The daemons offer their configuration only as formatted dumps, not as
//! a queryable API, so these parsers turn that text into typed trees.

pub mod confdump;
pub mod monitor;

pub use confdump::ConfNode;
pub use monitor::MonitorSnapshot;
