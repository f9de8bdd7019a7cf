// E2E Test 1: DNS publishing
// Full path: encrypted provider profile in the settings store ->
// registry lookup -> zone resolution -> create-then-update TXT upsert.

mod e2e;

use console_rs::dns::provider::{ProviderRegistry, UpsertOutcome};
use console_rs::dns::publisher::{DnsPublisher, MailRecord};
use console_rs::error::ConsoleError;
use console_rs::settings::SettingEntry;
use e2e::helpers::{memory_pool, settings_store, MemoryDnsProvider};
use std::sync::Arc;

#[tokio::test]
async fn test_e2e_publish_creates_then_updates() {
    let pool = memory_pool().await;
    let store = settings_store(pool.clone()).await;

    let profile = serde_json::json!({
        "type": "CLOUDFLAREAPI",
        "apitoken": "cf-e2e-token",
    })
    .to_string();
    store
        .save_settings(
            "dnscontrol",
            "default",
            "container",
            "mail1",
            &[SettingEntry::new("profile", profile.clone())],
            true,
        )
        .await
        .unwrap();

    // The profile must be unreadable at rest
    let (raw,): (String,) = sqlx::query_as("SELECT value FROM settings WHERE name = 'profile'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_ne!(raw, profile);
    assert!(!raw.contains("cf-e2e-token"));

    // Override the vendor implementation with the in-memory double
    let provider = Arc::new(MemoryDnsProvider::with_zone("z1", "example.com"));
    provider.seed("mail.example.com", "google-site-verification=keep-me");
    let mut registry = ProviderRegistry::new();
    registry.register("CLOUDFLAREAPI", provider.clone());

    let publisher = DnsPublisher::new(&store, &registry);

    // The record's apex is a child of the managed zone: suffix walk
    let spf = MailRecord::Spf {
        domain: "mail.example.com".to_string(),
        content: "v=spf1 mx -all".to_string(),
    };
    let outcome = publisher.publish("mail1", &spf).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let spf = MailRecord::Spf {
        domain: "mail.example.com".to_string(),
        content: "v=spf1 a mx -all".to_string(),
    };
    let outcome = publisher.publish("mail1", &spf).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    // One SPF record, updated in place; the unrelated TXT at the same
    // host survived both publishes
    let records = provider.records();
    let spf_records: Vec<_> = records
        .iter()
        .filter(|r| r.content.starts_with("v=spf1"))
        .collect();
    assert_eq!(spf_records.len(), 1);
    assert_eq!(spf_records[0].content, "v=spf1 a mx -all");
    assert!(records
        .iter()
        .any(|r| r.content == "google-site-verification=keep-me"));

    // A domain outside the managed zone fails zone resolution
    let outside = MailRecord::Spf {
        domain: "mail.other.net".to_string(),
        content: "v=spf1 mx -all".to_string(),
    };
    let err = publisher.publish("mail1", &outside).await.unwrap_err();
    assert!(err.to_string().contains("no zone found"));
}

#[tokio::test]
async fn test_e2e_publish_dkim_and_dmarc_hosts() {
    let pool = memory_pool().await;
    let store = settings_store(pool).await;
    store
        .save_settings(
            "dnscontrol",
            "default",
            "container",
            "mail1",
            &[SettingEntry::new(
                "profile",
                serde_json::json!({"type": "CLOUDFLAREAPI", "apitoken": "t"}).to_string(),
            )],
            true,
        )
        .await
        .unwrap();

    let provider = Arc::new(MemoryDnsProvider::with_zone("z1", "example.com"));
    let mut registry = ProviderRegistry::new();
    registry.register("CLOUDFLAREAPI", provider.clone());
    let publisher = DnsPublisher::new(&store, &registry);

    publisher
        .publish(
            "mail1",
            &MailRecord::Dkim {
                domain: "example.com".to_string(),
                selector: "mail".to_string(),
                content: "v=DKIM1; k=rsa; p=abc".to_string(),
            },
        )
        .await
        .unwrap();
    publisher
        .publish(
            "mail1",
            &MailRecord::Dmarc {
                domain: "example.com".to_string(),
                content: "v=DMARC1; p=quarantine".to_string(),
            },
        )
        .await
        .unwrap();

    let hosts: Vec<String> = provider.records().iter().map(|r| r.host.clone()).collect();
    assert!(hosts.contains(&"mail._domainkey.example.com".to_string()));
    assert!(hosts.contains(&"_dmarc.example.com".to_string()));
}

#[tokio::test]
async fn test_e2e_profile_without_type_is_fatal() {
    let pool = memory_pool().await;
    let store = settings_store(pool).await;
    store
        .save_settings(
            "dnscontrol",
            "default",
            "container",
            "mail2",
            &[SettingEntry::new(
                "profile",
                serde_json::json!({"apitoken": "t"}).to_string(),
            )],
            true,
        )
        .await
        .unwrap();

    let registry = ProviderRegistry::new();
    let publisher = DnsPublisher::new(&store, &registry);
    let err = publisher
        .publish(
            "mail2",
            &MailRecord::Spf {
                domain: "example.com".to_string(),
                content: "v=spf1 mx -all".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Config(_)));
}

#[tokio::test]
async fn test_e2e_unknown_provider_type_names_it() {
    let pool = memory_pool().await;
    let store = settings_store(pool).await;
    store
        .save_settings(
            "dnscontrol",
            "default",
            "container",
            "mail3",
            &[SettingEntry::new(
                "profile",
                serde_json::json!({"type": "ROUTE53", "apitoken": "t"}).to_string(),
            )],
            true,
        )
        .await
        .unwrap();

    let registry = ProviderRegistry::new();
    let publisher = DnsPublisher::new(&store, &registry);
    let err = publisher
        .publish(
            "mail3",
            &MailRecord::Spf {
                domain: "example.com".to_string(),
                content: "v=spf1 mx -all".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_caller_error());
    assert!(err.to_string().contains("ROUTE53"));
}
