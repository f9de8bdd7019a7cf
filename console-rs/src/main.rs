use clap::{Parser, Subcommand};
use console_rs::config::Config;
use console_rs::dns::blacklist::{probe_address, BlacklistChecker};
use console_rs::dns::health::HealthChecker;
use console_rs::dns::provider::ProviderRegistry;
use console_rs::dns::public_ip::PublicIpProbe;
use console_rs::dns::publisher::{DnsPublisher, MailRecord};
use console_rs::error::Result as ConsoleResult;
use console_rs::exec::docker::DockerShell;
use console_rs::rate_limit::RateLimiter;
use console_rs::settings::{SettingEntry, SettingsCipher, SettingsStore, TargetResolver};
use console_rs::spamfilter::bayes::{
    identity_counts, BayesJournal, BayesTrainer, IdentityCounts, LearnAction,
};
use console_rs::spamfilter::client::FilterClient;
use console_rs::stack::domains::DomainRegistry;
use console_rs::stack::resources::ResourceSnapshot;
use console_rs::stack::{envs, resources};
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Settings plugin holding the mail-stack connection profile.
const STACK_PLUGIN: &str = "mailserver";

#[derive(Parser)]
#[command(name = "console-rs", about = "Mail-stack integration console", version)]
struct Cli {
    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull the environment snapshot from a container
    Envs { container: String },
    /// Pull a resource + statistics snapshot from a container
    Snapshot { container: String },
    /// DNS operations
    Dns {
        #[command(subcommand)]
        command: DnsCommand,
    },
    /// Train the Bayes classifier on a message
    Train {
        container: String,
        message_id: String,
        /// `ham` or `spam`
        action: String,
        /// Operator identity recorded in the journal
        #[arg(long, default_value = "console")]
        learned_by: String,
    },
    /// Settings store access
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum DnsCommand {
    /// Health report: authoritative records plus blacklist probes
    Check {
        domain: String,
        #[arg(long)]
        selector: Option<String>,
    },
    /// Publish one mail TXT record through the configured provider
    Publish {
        container: String,
        domain: String,
        /// `spf`, `dkim` or `dmarc`
        record: String,
        content: String,
        #[arg(long)]
        selector: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Get {
        plugin: String,
        container: String,
        name: String,
        #[arg(long)]
        encrypted: bool,
    },
    Set {
        plugin: String,
        container: String,
        name: String,
        value: String,
        #[arg(long)]
        encrypted: bool,
        #[arg(long, default_value = "default")]
        schema: String,
        #[arg(long, default_value = "container")]
        scope: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if std::path::Path::new(&cli.config).exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };

    let level: Level = config.logging.level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;

    let cipher = SettingsCipher::new(&config.settings.secret)?;
    let store = SettingsStore::new(pool.clone(), cipher);
    store.init_db().await?;
    let registry = DomainRegistry::new(pool.clone());
    registry.init_db().await?;
    let journal = BayesJournal::new(pool.clone());
    journal.init_db().await?;

    let shell = DockerShell::new();
    let resolver = TargetResolver::with_control(&store, &config.control);
    let limiter = RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window_secs,
    );

    match cli.command {
        Command::Envs { container } => {
            throttle(&limiter, &container).await?;
            let target = resolver.resolve(STACK_PLUGIN, &container, &[]).await?;
            let snapshot = envs::pull_server_envs(&shell, &target, &registry).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Snapshot { container } => {
            throttle(&limiter, &container).await?;
            let target = resolver.resolve(STACK_PLUGIN, &container, &[]).await?;
            let client = FilterClient::new(&target)?;
            let (snapshot, stat, counts) = tokio::join!(
                resources::pull_resources(&shell, &target),
                client.stat(),
                identity_counts(&shell, &target),
            );
            let report = snapshot_report(snapshot, stat, counts);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Dns { command } => match command {
            DnsCommand::Check { domain, selector } => {
                let health = HealthChecker::new();
                let report = health.check(&domain, selector.as_deref()).await?;

                let public_ip = PublicIpProbe::new(
                    config.dns.public_ip_url.clone(),
                    Duration::from_secs(config.dns.public_ip_ttl_secs),
                );
                let blacklist = match probe_address(&health, &public_ip, &domain).await {
                    Ok(ip) => Some(
                        BlacklistChecker::new()
                            .check(ip, &config.dns.blacklist_zones)
                            .await,
                    ),
                    Err(err) => {
                        info!("no probeable address for {domain}: {err}");
                        None
                    }
                };
                let report = serde_json::json!({
                    "records": report,
                    "blacklist": blacklist,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            DnsCommand::Publish {
                container,
                domain,
                record,
                content,
                selector,
            } => {
                let record = match record.as_str() {
                    "spf" => MailRecord::Spf { domain, content },
                    "dmarc" => MailRecord::Dmarc { domain, content },
                    "dkim" => MailRecord::Dkim {
                        domain,
                        selector: selector
                            .ok_or_else(|| anyhow::anyhow!("dkim records need --selector"))?,
                        content,
                    },
                    other => anyhow::bail!("unknown record kind: {other}"),
                };
                let providers = ProviderRegistry::new();
                let publisher = DnsPublisher::new(&store, &providers);
                let outcome = publisher.publish(&container, &record).await?;
                println!("{}", serde_json::json!({ "outcome": format!("{outcome:?}") }));
            }
        },
        Command::Train {
            container,
            message_id,
            action,
            learned_by,
        } => {
            throttle(&limiter, &container).await?;
            let target = resolver.resolve(STACK_PLUGIN, &container, &[]).await?;
            let action = LearnAction::parse(&action)?;
            let trainer = BayesTrainer::new(&shell, &journal)
                .with_search_timeout(Duration::from_secs(config.control.search_timeout_secs));
            trainer
                .train(&target, &message_id, action, &learned_by)
                .await?;
            println!("{}", serde_json::json!({ "trained": message_id }));
        }
        Command::Settings { command } => match command {
            SettingsCommand::Get {
                plugin,
                container,
                name,
                encrypted,
            } => {
                let value = store.get_setting(&plugin, &container, &name, encrypted).await?;
                println!("{}", serde_json::json!({ "name": name, "value": value }));
            }
            SettingsCommand::Set {
                plugin,
                container,
                name,
                value,
                encrypted,
                schema,
                scope,
            } => {
                store
                    .save_settings(
                        &plugin,
                        &schema,
                        &scope,
                        &container,
                        &[SettingEntry::new(name.clone(), value)],
                        encrypted,
                    )
                    .await?;
                println!("{}", serde_json::json!({ "saved": name }));
            }
        },
    }

    Ok(())
}

/// Refuse remote-touching commands for a container once its window is
/// exhausted.
async fn throttle(limiter: &RateLimiter, container: &str) -> anyhow::Result<()> {
    if limiter.check(container).await {
        Ok(())
    } else {
        anyhow::bail!("rate limit exceeded for {container}")
    }
}

/// Assemble the snapshot report from the three concurrent pulls.
///
/// A failed sub-operation degrades its own section and is listed in
/// `errors`; it never voids the sections that did succeed.
fn snapshot_report(
    resources: ConsoleResult<ResourceSnapshot>,
    stat: ConsoleResult<serde_json::Value>,
    counts: ConsoleResult<Vec<IdentityCounts>>,
) -> serde_json::Value {
    let mut errors = Vec::new();

    let resources = resources.unwrap_or_else(|e| {
        warn!("Resource pull failed: {e}");
        errors.push(format!("resources: {e}"));
        ResourceSnapshot::default()
    });
    let stat = stat.unwrap_or_else(|e| {
        warn!("Filter stat fetch failed: {e}");
        errors.push(format!("filter: {e}"));
        serde_json::Value::Null
    });
    let counts = counts.unwrap_or_else(|e| {
        warn!("Bayes identity scan failed: {e}");
        errors.push(format!("bayes_identities: {e}"));
        Vec::new()
    });

    serde_json::json!({
        "resources": resources,
        "filter": stat,
        "bayes_identities": counts,
        "errors": errors,
    })
}
