use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub settings: SettingsConfig,
    pub control: ControlConfig,
    pub dns: DnsConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
    /// Server-held secret the settings cipher key is derived from.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    pub scheme: String,
    pub port: u16,
    /// Timeout for local-network control-channel calls.
    pub timeout_secs: u64,
    /// Timeout for full-mailbox searches, which may scan many mailboxes.
    pub search_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    pub blacklist_zones: Vec<BlacklistZoneConfig>,
    pub public_ip_url: String,
    pub public_ip_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlacklistZoneConfig {
    pub zone: String,
    /// Credential for key-gated reputation lists. Zones that require a
    /// key are skipped entirely when this is absent.
    pub key: Option<String>,
    #[serde(default)]
    pub requires_key: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ConsoleError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| crate::error::ConsoleError::Config(e.to_string()))
    }

}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://console.db?mode=rwc".to_string(),
            },
            settings: SettingsConfig {
                secret: "change-me".to_string(),
            },
            control: ControlConfig {
                scheme: "http".to_string(),
                port: 11334,
                timeout_secs: 8,
                search_timeout_secs: 30,
            },
            dns: DnsConfig {
                blacklist_zones: vec![
                    BlacklistZoneConfig {
                        zone: "zen.spamhaus.org".to_string(),
                        key: None,
                        requires_key: false,
                    },
                    BlacklistZoneConfig {
                        zone: "bl.spamcop.net".to_string(),
                        key: None,
                        requires_key: false,
                    },
                    BlacklistZoneConfig {
                        zone: "b.barracudacentral.org".to_string(),
                        key: None,
                        requires_key: false,
                    },
                    BlacklistZoneConfig {
                        zone: "dnsbl.sorbs.net".to_string(),
                        key: None,
                        requires_key: false,
                    },
                ],
                public_ip_url: "https://api.ipify.org".to_string(),
                public_ip_ttl_secs: 3600,
            },
            rate_limit: RateLimitConfig {
                max_requests: 100,
                window_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.control.port, 11334);
        assert_eq!(config.dns.public_ip_ttl_secs, 3600);
        assert_eq!(config.dns.blacklist_zones.len(), 4);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[database]
url = "sqlite::memory:"

[settings]
secret = "s3cret"

[control]
scheme = "https"
port = 443
timeout_secs = 5
search_timeout_secs = 20

[dns]
blacklist_zones = [{{ zone = "zen.spamhaus.org" }}]
public_ip_url = "https://api.ipify.org"
public_ip_ttl_secs = 600

[rate_limit]
max_requests = 10
window_secs = 30

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.control.scheme, "https");
        assert_eq!(config.dns.blacklist_zones[0].zone, "zen.spamhaus.org");
        assert!(config.dns.blacklist_zones[0].key.is_none());
    }

    #[test]
    fn test_from_file_missing() {
        assert!(Config::from_file("/nonexistent/config.toml").is_err());
    }
}
