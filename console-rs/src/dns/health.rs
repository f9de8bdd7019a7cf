//! Authoritative-record health report
//!
//! Enumerates the records a working mail domain should publish. Absence
//! of any record type is a normal outcome, not an error; only resolver
//! failures other than "no records" end up in the report's error list,
//! and they never fail the report as a whole.

use crate::error::Result;
use serde::Serialize;
use std::net::IpAddr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver;
use tracing::debug;

/// DANE is only meaningful on the mail submission/relay ports.
const TLSA_PORTS: &[u16] = &[25, 465, 587];

/// Client-autoconfiguration services mail clients probe for.
const SRV_SERVICES: &[&str] = &[
    "_submission._tcp",
    "_submissions._tcp",
    "_imap._tcp",
    "_imaps._tcp",
    "_pop3._tcp",
    "_pop3s._tcp",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct DnsHealthReport {
    pub domain: String,
    pub a: Vec<String>,
    pub mx: Vec<String>,
    pub spf: Option<String>,
    pub dkim: Option<String>,
    pub dmarc: Option<String>,
    /// TLSA owner names that resolved to at least one record.
    pub tlsa: Vec<String>,
    /// SRV owner names that resolved, with their targets.
    pub srv: Vec<String>,
    /// Sub-operation failures; the rest of the report is still valid.
    pub errors: Vec<String>,
}

pub struct HealthChecker {
    resolver: TokioAsyncResolver,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Build the full report for a domain. Independent lookups run
    /// concurrently; TLSA waits on the MX answer it depends on.
    pub async fn check(&self, domain: &str, dkim_selector: Option<&str>) -> Result<DnsHealthReport> {
        let mut report = DnsHealthReport {
            domain: domain.to_string(),
            ..Default::default()
        };

        let dkim_host = dkim_selector.map(|selector| format!("{selector}._domainkey.{domain}"));
        let dmarc_host = format!("_dmarc.{domain}");

        let (a, mx, spf_txt, dkim_txt, dmarc_txt, srv) = tokio::join!(
            self.lookup_a(domain),
            self.lookup_mx(domain),
            self.lookup_txt(domain),
            async {
                match &dkim_host {
                    Some(host) => self.lookup_txt(host).await,
                    None => Ok(Vec::new()),
                }
            },
            self.lookup_txt(&dmarc_host),
            self.lookup_srv(domain),
        );

        report.a = absorb(a, "A", &mut report.errors);
        report.mx = absorb(mx, "MX", &mut report.errors);
        report.spf = absorb(spf_txt, "SPF", &mut report.errors)
            .into_iter()
            .find(|txt| txt.starts_with("v=spf1"));
        report.dkim = absorb(dkim_txt, "DKIM", &mut report.errors)
            .into_iter()
            .find(|txt| txt.starts_with("v=DKIM1"));
        report.dmarc = absorb(dmarc_txt, "DMARC", &mut report.errors)
            .into_iter()
            .find(|txt| txt.starts_with("v=DMARC1"));
        report.srv = absorb(srv, "SRV", &mut report.errors);

        for mx_host in report.mx.clone() {
            let tlsa = self.lookup_tlsa(&mx_host).await;
            report
                .tlsa
                .extend(absorb(tlsa, "TLSA", &mut report.errors));
        }

        debug!(domain, errors = report.errors.len(), "DNS health report built");
        Ok(report)
    }

    /// The first resolvable mail-exchanger address, for blacklist
    /// probing.
    pub async fn mx_address(&self, domain: &str) -> Option<IpAddr> {
        let mx = self.lookup_mx(domain).await.ok()?;
        for host in mx {
            if let Ok(lookup) = self.resolver.lookup_ip(host.as_str()).await {
                if let Some(ip) = lookup.iter().next() {
                    return Some(ip);
                }
            }
        }
        None
    }

    async fn lookup_a(&self, domain: &str) -> std::result::Result<Vec<String>, ResolveError> {
        let lookup = self.resolver.lookup_ip(domain).await?;
        Ok(lookup.iter().map(|ip| ip.to_string()).collect())
    }

    async fn lookup_mx(&self, domain: &str) -> std::result::Result<Vec<String>, ResolveError> {
        let lookup = self.resolver.mx_lookup(domain).await?;
        let mut exchanges: Vec<(u16, String)> = lookup
            .iter()
            .map(|mx| {
                (
                    mx.preference(),
                    mx.exchange().to_string().trim_end_matches('.').to_string(),
                )
            })
            .collect();
        exchanges.sort();
        Ok(exchanges.into_iter().map(|(_, host)| host).collect())
    }

    async fn lookup_txt(&self, host: &str) -> std::result::Result<Vec<String>, ResolveError> {
        let lookup = self.resolver.txt_lookup(host).await?;
        Ok(lookup.iter().map(|txt| txt.to_string()).collect())
    }

    async fn lookup_srv(&self, domain: &str) -> std::result::Result<Vec<String>, ResolveError> {
        let mut found = Vec::new();
        for service in SRV_SERVICES {
            let owner = format!("{service}.{domain}");
            match self.resolver.srv_lookup(owner.as_str()).await {
                Ok(lookup) => {
                    for srv in lookup.iter() {
                        found.push(format!(
                            "{owner} -> {}:{}",
                            srv.target().to_string().trim_end_matches('.'),
                            srv.port()
                        ));
                    }
                }
                Err(err) if is_absent(&err) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    async fn lookup_tlsa(&self, mx_host: &str) -> std::result::Result<Vec<String>, ResolveError> {
        let mut found = Vec::new();
        for port in TLSA_PORTS {
            let owner = format!("_{port}._tcp.{mx_host}");
            match self.resolver.lookup(owner.as_str(), RecordType::TLSA).await {
                Ok(lookup) => {
                    if lookup.iter().next().is_some() {
                        found.push(owner);
                    }
                }
                Err(err) if is_absent(&err) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// "No records" is healthy-domain vocabulary, not a failure.
fn is_absent(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

/// Flatten a sub-lookup result: absence becomes an empty list, real
/// failures accumulate without aborting the report.
fn absorb(
    result: std::result::Result<Vec<String>, ResolveError>,
    label: &str,
    errors: &mut Vec<String>,
) -> Vec<String> {
    match result {
        Ok(values) => values,
        Err(err) if is_absent(&err) => Vec::new(),
        Err(err) => {
            errors.push(format!("{label} lookup failed: {err}"));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_accumulates_failures() {
        let mut errors = Vec::new();

        let ok = absorb(Ok(vec!["a".to_string()]), "A", &mut errors);
        assert_eq!(ok, vec!["a"]);
        assert!(errors.is_empty());

        let failed = absorb(
            Err(ResolveError::from("servfail upstream")),
            "MX",
            &mut errors,
        );
        assert!(failed.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("MX lookup failed"));
    }

    #[test]
    fn test_fixed_probe_sets() {
        assert_eq!(TLSA_PORTS, &[25, 465, 587]);
        assert!(SRV_SERVICES.contains(&"_submission._tcp"));
        assert!(SRV_SERVICES.contains(&"_imaps._tcp"));
    }
}
