//! Success/error envelope for the route layer
//!
//! Every public operation reports back as `{"success":true,"message":…}`
//! or `{"success":false,"error":…}`. Expected failures (caller errors,
//! remote unavailability) become envelope errors; internal failures keep
//! propagating so they surface as a 500-equivalent.

use crate::error::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Two-variant result envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Ok(T),
    Err(String),
}

impl<T> Reply<T> {
    /// Classify a core result into an envelope.
    ///
    /// Caller errors are reported inside the envelope; everything else
    /// propagates unchanged.
    pub fn classify(result: Result<T>) -> Result<Reply<T>> {
        match result {
            Ok(value) => Ok(Reply::Ok(value)),
            Err(e) if e.is_caller_error() => Ok(Reply::Err(e.to_string())),
            Err(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Reply::Ok(message) => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("message", message)?;
            }
            Reply::Err(error) => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;

    #[test]
    fn test_serialize_ok() {
        let reply = Reply::Ok("pong".to_string());
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"success":true,"message":"pong"}"#);
    }

    #[test]
    fn test_serialize_err() {
        let reply: Reply<String> = Reply::Err("missing container".to_string());
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"missing container"}"#);
    }

    #[test]
    fn test_classify_caller_error() {
        let result: Result<()> = Err(ConsoleError::invalid("missing container"));
        let reply = Reply::classify(result).unwrap();
        assert!(!reply.is_success());
    }

    #[test]
    fn test_classify_internal_error() {
        let result: Result<()> = Err(ConsoleError::Cipher("bad key".to_string()));
        assert!(Reply::classify(result).is_err());
    }
}
