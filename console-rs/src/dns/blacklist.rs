//! DNSBL probing
//!
//! A listed address resolves under the blacklist zone, an unlisted one
//! returns no records. Probes only make sense for public addresses;
//! picking the address to probe is the caller's job via
//! `probe_address`.

use crate::config::BlacklistZoneConfig;
use crate::dns::health::HealthChecker;
use crate::dns::public_ip::{is_public, PublicIpProbe};
use crate::error::Result;
use serde::Serialize;
use std::net::IpAddr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ZoneVerdict {
    pub zone: String,
    pub listed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BlacklistReport {
    pub ip: String,
    pub verdicts: Vec<ZoneVerdict>,
    /// Key-gated zones with no key configured.
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

pub struct BlacklistChecker {
    resolver: TokioAsyncResolver,
}

impl BlacklistChecker {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Probe one address against every usable zone. Per-zone failures
    /// accumulate; the report always covers the zones that answered.
    pub async fn check(&self, ip: IpAddr, zones: &[BlacklistZoneConfig]) -> BlacklistReport {
        let mut report = BlacklistReport {
            ip: ip.to_string(),
            ..Default::default()
        };
        let reversed = reverse_ip(&ip);

        for zone in zones {
            let query = match (&zone.key, zone.requires_key) {
                (Some(key), _) => format!("{reversed}.{key}.{}", zone.zone),
                (None, true) => {
                    debug!(zone = %zone.zone, "skipping key-gated blacklist zone");
                    report.skipped.push(zone.zone.clone());
                    continue;
                }
                (None, false) => format!("{reversed}.{}", zone.zone),
            };

            match self.resolver.ipv4_lookup(query.as_str()).await {
                Ok(_) => {
                    warn!(%ip, zone = %zone.zone, "address is blacklisted");
                    report.verdicts.push(ZoneVerdict {
                        zone: zone.zone.clone(),
                        listed: true,
                    });
                }
                Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                    report.verdicts.push(ZoneVerdict {
                        zone: zone.zone.clone(),
                        listed: false,
                    });
                }
                Err(err) => {
                    report
                        .errors
                        .push(format!("{} probe failed: {err}", zone.zone));
                }
            }
        }
        report
    }
}

impl Default for BlacklistChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// The address to probe for a domain: the resolved mail-exchanger
/// address when it is public, otherwise the externally-probed address.
/// Behind NAT the MX resolves to a private address that no blacklist
/// zone knows about.
pub async fn probe_address(
    health: &HealthChecker,
    public_ip: &PublicIpProbe,
    domain: &str,
) -> Result<IpAddr> {
    if let Some(ip) = health.mx_address(domain).await {
        if is_public(ip) {
            return Ok(ip);
        }
        debug!(%ip, "resolved MX address is not public, falling back to probe");
    }
    public_ip.current().await
}

/// Reverse an address into DNSBL query order: octets for IPv4, nibbles
/// for IPv6.
pub fn reverse_ip(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            format!("{}.{}.{}.{}", octets[3], octets[2], octets[1], octets[0])
        }
        IpAddr::V6(v6) => {
            let mut nibbles = Vec::with_capacity(32);
            for segment in v6.segments().iter().rev() {
                for i in 0..4 {
                    nibbles.push(format!("{:x}", (segment >> (i * 4)) & 0xf));
                }
            }
            nibbles.join(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_ipv4() {
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(reverse_ip(&ip), "1.2.0.192");
    }

    #[test]
    fn test_reverse_ipv6() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        let reversed = reverse_ip(&ip);
        assert!(reversed.starts_with("1.0.0.0."));
        assert!(reversed.ends_with("1.0.0.2"));
        assert_eq!(reversed.split('.').count(), 32);
    }

    #[tokio::test]
    async fn test_key_gated_zones_skipped() {
        let checker = BlacklistChecker::new();
        let zones = vec![BlacklistZoneConfig {
            zone: "keyed.dnsbl.example".to_string(),
            key: None,
            requires_key: true,
        }];
        let report = checker
            .check("203.0.113.9".parse().unwrap(), &zones)
            .await;
        assert_eq!(report.skipped, vec!["keyed.dnsbl.example"]);
        assert!(report.verdicts.is_empty());
    }
}
