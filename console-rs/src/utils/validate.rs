//! Strict allow-patterns for untrusted values
//!
//! Message ids, identities, domains and selectors are interpolated into
//! remote commands and DNS names. Each one is validated against a strict
//! pattern before use; anything that does not match is a caller error.

use crate::error::{ConsoleError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap())
}

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,}$").unwrap()
    })
}

fn selector_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap())
}

fn message_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // RFC 5322 msg-id minus the angle brackets, restricted to characters
    // that are inert inside a single-quoted shell word.
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9.!#$%&*+/=?^_`{|}~-]+@[A-Za-z0-9.-]+$").unwrap())
}

fn hex_guid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{32}$").unwrap())
}

fn uid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

/// Validate a mailbox identity (user@domain).
pub fn email(value: &str) -> Result<()> {
    if email_re().is_match(value) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("invalid email address: {value}")))
    }
}

/// Check whether a string looks like a mailbox identity.
pub fn is_email(value: &str) -> bool {
    email_re().is_match(value)
}

/// Validate a fully-qualified domain name.
pub fn domain(value: &str) -> Result<()> {
    if domain_re().is_match(value) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("invalid domain name: {value}")))
    }
}

/// Validate a DKIM selector label.
pub fn selector(value: &str) -> Result<()> {
    if selector_re().is_match(value) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("invalid DKIM selector: {value}")))
    }
}

/// Validate a Message-ID header value (angle brackets already stripped).
pub fn message_id(value: &str) -> Result<()> {
    if message_id_re().is_match(value) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("invalid message id: {value}")))
    }
}

/// Validate a 32-hex mailbox guid as reported by the search command.
pub fn mailbox_guid(value: &str) -> Result<()> {
    if hex_guid_re().is_match(value) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("invalid mailbox guid: {value}")))
    }
}

/// Check whether a string is a 32-hex blob (hashed identity variant).
pub fn is_hex_guid(value: &str) -> bool {
    hex_guid_re().is_match(value)
}

/// Validate a numeric message sequence number.
pub fn message_uid(value: &str) -> Result<()> {
    if uid_re().is_match(value) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("invalid message uid: {value}")))
    }
}
