//! DKIM key discovery and generation
//!
//! Keys live inside the mail container; everything here goes through the
//! execution facade. Key files follow the `<domain>.<selector>.key`
//! naming convention under the signing key directory.

use crate::error::{ConsoleError, Result};
use crate::exec::{ExecOpts, RemoteShell};
use crate::settings::target::Target;
use crate::stack::domains::{DomainRecord, DomainRegistry};
use crate::utils::{shell, validate};
use tracing::{debug, warn};

/// Default signing key directory inside the container.
pub const KEY_DIR: &str = "/var/lib/rspamd/dkim";

/// Key material facts probed from a key file.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyInfo {
    pub key_type: String,
    pub key_size: Option<String>,
}

/// Probe a key file for its type and, for RSA, its size in bits.
pub async fn probe_key(
    shell: &dyn RemoteShell,
    target: &Target,
    path: &str,
) -> Result<KeyInfo> {
    let command = format!("openssl pkey -in {} -noout -text", shell::quote(path));
    let output = shell
        .exec_command(&command, target, ExecOpts::default())
        .await?;

    if !output.success() {
        return Err(ConsoleError::Exec(format!(
            "key probe failed for {path}: {}",
            output.stderr.trim()
        )));
    }

    parse_key_probe(&output.stdout)
        .ok_or_else(|| ConsoleError::Exec(format!("unrecognized key format in {path}")))
}

/// Parse `openssl pkey -text` output into key facts.
fn parse_key_probe(text: &str) -> Option<KeyInfo> {
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("ED25519 Private-Key") {
            return Some(KeyInfo {
                key_type: "ed25519".to_string(),
                key_size: None,
            });
        }
        // "Private-Key: (2048 bit, 2 primes)" or "RSA Private-Key: (2048 bit)"
        if line.contains("Private-Key:") {
            if let Some(start) = line.find('(') {
                let bits: String = line[start + 1..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if !bits.is_empty() {
                    return Some(KeyInfo {
                        key_type: "rsa".to_string(),
                        key_size: Some(bits),
                    });
                }
            }
        }
    }
    None
}

/// Generate a fresh signing key for a domain and upsert its record.
///
/// Returns the DNS TXT value to publish for the new key.
pub async fn generate_key(
    shell: &dyn RemoteShell,
    target: &Target,
    registry: &DomainRegistry,
    domain: &str,
    selector: &str,
    key_type: &str,
    key_size: u32,
) -> Result<String> {
    validate::domain(domain)?;
    validate::selector(selector)?;

    let path = format!("{KEY_DIR}/{domain}.{selector}.key");
    let quoted_path = shell::quote(&path);

    let genpkey = match key_type {
        "rsa" => format!(
            "openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:{key_size} -out {quoted_path}"
        ),
        "ed25519" => format!("openssl genpkey -algorithm ED25519 -out {quoted_path}"),
        other => {
            return Err(ConsoleError::invalid(format!(
                "unsupported key type: {other}"
            )));
        }
    };

    let output = shell
        .exec_command(&genpkey, target, ExecOpts::default())
        .await?;
    if !output.success() {
        return Err(ConsoleError::Exec(format!(
            "key generation failed: {}",
            output.stderr.trim()
        )));
    }

    let pubkey = shell
        .exec_command(
            &format!("openssl pkey -in {quoted_path} -pubout -outform PEM"),
            target,
            ExecOpts::default(),
        )
        .await?;
    if !pubkey.success() {
        return Err(ConsoleError::Exec(format!(
            "public key extraction failed: {}",
            pubkey.stderr.trim()
        )));
    }

    let record = DomainRecord {
        name: domain.to_string(),
        container: target.container.clone(),
        dkim_selector: selector.to_string(),
        key_type: key_type.to_string(),
        key_size: match key_type {
            "rsa" => Some(key_size.to_string()),
            _ => None,
        },
        key_path: path,
    };
    registry.upsert(&record).await?;

    Ok(txt_value(key_type, &pubkey.stdout))
}

/// Assemble the `v=DKIM1` TXT value from a PEM public key.
pub fn txt_value(key_type: &str, pem: &str) -> String {
    let p: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("");
    format!("v=DKIM1; k={key_type}; p={p}")
}

/// Discover key files under the signing key directory.
///
/// The fallback path when the signing configuration has no per-domain
/// section. Finding nothing is surfaced as a warning, not an error: a
/// remote key store with a different layout looks exactly the same.
pub async fn discover_key_files(
    shell: &dyn RemoteShell,
    target: &Target,
) -> Result<Vec<(String, String, String)>> {
    let output = shell
        .exec_command(&format!("ls -1 {KEY_DIR}"), target, ExecOpts::default())
        .await?;

    if !output.success() {
        warn!(
            "Key directory listing failed on {}: {}",
            target.container,
            output.stderr.trim()
        );
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for file in output.stdout.lines() {
        let file = file.trim();
        // <domain>.<selector>.key
        let Some(stem) = file.strip_suffix(".key") else {
            continue;
        };
        let Some((domain, selector)) = stem.rsplit_once('.') else {
            continue;
        };
        if validate::domain(domain).is_err() || validate::selector(selector).is_err() {
            debug!("Skipping unrecognized key file name: {file}");
            continue;
        }
        found.push((
            domain.to_string(),
            selector.to_string(),
            format!("{KEY_DIR}/{file}"),
        ));
    }

    if found.is_empty() {
        warn!(
            "No signing keys discovered under {KEY_DIR} on {}",
            target.container
        );
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecOutput, ScriptedShell};
    use std::time::Duration;

    fn target() -> Target {
        Target {
            container: "mail1".to_string(),
            host: "mail1".to_string(),
            port: 11334,
            scheme: "http".to_string(),
            auth_token: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_parse_key_probe_rsa() {
        let info = parse_key_probe("RSA Private-Key: (2048 bit, 2 primes)\nmodulus:\n").unwrap();
        assert_eq!(info.key_type, "rsa");
        assert_eq!(info.key_size.as_deref(), Some("2048"));
    }

    #[test]
    fn test_parse_key_probe_openssl3_rsa() {
        let info = parse_key_probe("Private-Key: (4096 bit, 2 primes)\n").unwrap();
        assert_eq!(info.key_type, "rsa");
        assert_eq!(info.key_size.as_deref(), Some("4096"));
    }

    #[test]
    fn test_parse_key_probe_ed25519() {
        let info = parse_key_probe("ED25519 Private-Key:\npriv:\n").unwrap();
        assert_eq!(info.key_type, "ed25519");
        assert!(info.key_size.is_none());
    }

    #[test]
    fn test_parse_key_probe_garbage() {
        assert!(parse_key_probe("unable to load key").is_none());
    }

    #[test]
    fn test_txt_value_strips_pem_armor() {
        let pem = "-----BEGIN PUBLIC KEY-----\nMIIBIjANBg\nkqhkiG9w0B\n-----END PUBLIC KEY-----\n";
        assert_eq!(txt_value("rsa", pem), "v=DKIM1; k=rsa; p=MIIBIjANBgkqhkiG9w0B");
    }

    #[tokio::test]
    async fn test_discover_key_files() {
        let shell = ScriptedShell::new().on(
            "ls -1",
            ExecOutput::ok("example.com.mail.key\nother.org.dkim2024.key\nREADME\nnot-a-key.pem\n"),
        );

        let found = discover_key_files(&shell, &target()).await.unwrap();
        assert_eq!(
            found,
            vec![
                (
                    "example.com".to_string(),
                    "mail".to_string(),
                    format!("{KEY_DIR}/example.com.mail.key"),
                ),
                (
                    "other.org".to_string(),
                    "dkim2024".to_string(),
                    format!("{KEY_DIR}/other.org.dkim2024.key"),
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_key_files_empty_dir() {
        let shell = ScriptedShell::new().on("ls -1", ExecOutput::ok(""));
        let found = discover_key_files(&shell, &target()).await.unwrap();
        assert!(found.is_empty());
    }
}
