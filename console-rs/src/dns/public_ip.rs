//! Cached public-IP discovery
//!
//! The appliance usually sits behind NAT, so blacklist probing needs the
//! externally visible address. One process-wide probe result is cached
//! for an hour; the cache resets only on expiry or process restart.

use crate::error::{ConsoleError, Result};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PublicIpProbe {
    http: reqwest::Client,
    url: String,
    ttl: Duration,
    cache: RwLock<Option<(IpAddr, Instant)>>,
}

impl PublicIpProbe {
    pub fn new(url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// The current public address, probing only when the cached value
    /// has expired. Staleness is the only risk here, so the
    /// read-check-write is not guarded against concurrent probes.
    pub async fn current(&self) -> Result<IpAddr> {
        if let Some((ip, stamp)) = *self.cache.read().await {
            if stamp.elapsed() < self.ttl {
                return Ok(ip);
            }
        }

        let body = self
            .http
            .get(&self.url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?
            .text()
            .await?;
        let ip = parse_ip(&body)?;
        debug!(%ip, "probed public address");

        *self.cache.write().await = Some((ip, Instant::now()));
        Ok(ip)
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, ip: IpAddr, age: Duration) {
        let stamp = Instant::now() - age;
        *self.cache.write().await = Some((ip, stamp));
    }
}

fn parse_ip(body: &str) -> Result<IpAddr> {
    body.trim()
        .parse()
        .map_err(|_| {
            ConsoleError::Provider("public-IP probe returned non-address data".to_string())
        })
}

/// Whether an address is usable for blacklist probing. Private,
/// loopback, link-local and unspecified addresses never appear in DNSBL
/// zones.
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified())
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            let unique_local = (segments[0] & 0xfe00) == 0xfc00;
            let link_local = (segments[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
