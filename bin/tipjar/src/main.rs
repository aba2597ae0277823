//! Tipjar - batched multi-currency tip distribution.
//!
//! # Usage
//!
//! ```bash
//! # Dry run: print the call plan for a $5 USDC tip to two addresses
//! tipjar plan --payer alice --to 0xabc...,0xdef... --usd 5 --currency usdc
//!
//! # Send a tip to everyone holding the "speaker" role
//! WALLET_FROM=0x... DATABASE_URL=postgres://localhost/tipjar \
//!     tipjar send --payer alice --role speaker --usd 10 --currency eth
//!
//! # Apply database migrations
//! DATABASE_URL=postgres://localhost/tipjar tipjar migrate
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use tipjar_core::adapters::{
    BroadcastNotifier, MemoryTipRecordStore, StaticPriceSource, StaticRoster,
};
use tipjar_core::config::EngineConfig;
use tipjar_core::error::WalletResult;
use tipjar_core::executor::{SequentialExecutor, TransactionExecutor, select_executor};
use tipjar_core::metrics::init_metrics;
use tipjar_core::models::{PayerId, RecipientSelector, RoleTag, TipRequest, parse_usd_amount};
use tipjar_core::ports::{TipNotifier, TipRecordStore, WalletCapabilities, WalletTransport};
use tipjar_core::services::TipService;
use tipjar_storage::{Database, DatabaseConfig, PgTipRecordStore};
use tipjar_wallet::{JsonRpcWallet, JsonRpcWalletConfig};

/// Tipjar CLI.
#[derive(Parser, Debug)]
#[command(name = "tipjar")]
#[command(about = "Tipjar - batched multi-currency tip distribution")]
#[command(version)]
struct Cli {
    /// JSON file with the engine config, static prices and roster.
    #[arg(long, env = "TIPJAR_CONFIG", default_value = "tipjar.json", global = true)]
    config: PathBuf,

    /// Override the maximum number of recipients per distribution call.
    #[arg(long, env = "MAX_BATCH_SIZE", global = true)]
    max_batch_size: Option<usize>,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS", global = true)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a tip and print its call plan without submitting.
    Plan(TipArgs),

    /// Submit a tip through the wallet.
    Send {
        #[command(flatten)]
        tip: TipArgs,

        #[command(flatten)]
        wallet: WalletArgs,

        /// PostgreSQL database URL. Records are kept in memory when unset.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },

    /// Run database migrations and exit.
    Migrate {
        /// PostgreSQL database URL.
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Print the most recent tips sent by a payer.
    History {
        /// Payer identifier.
        #[arg(long, env = "TIPJAR_PAYER")]
        payer: String,

        /// Maximum number of records.
        #[arg(long, default_value = "20")]
        limit: u32,

        /// PostgreSQL database URL.
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[derive(Args, Debug)]
struct TipArgs {
    /// Payer identifier.
    #[arg(long, env = "TIPJAR_PAYER")]
    payer: String,

    /// Recipient wallet addresses (comma separated or repeated).
    #[arg(
        long = "to",
        value_delimiter = ',',
        conflicts_with = "roles",
        required_unless_present = "roles"
    )]
    addresses: Vec<String>,

    /// Recipient role tags, resolved against the roster.
    #[arg(long = "role", value_delimiter = ',')]
    roles: Vec<String>,

    /// Tip amount in USD.
    #[arg(long)]
    usd: String,

    /// Currency id from the config file.
    #[arg(long)]
    currency: String,

    /// Override a USD quote, as `currency=price` (repeatable).
    #[arg(long = "price", value_parser = parse_price)]
    prices: Vec<(String, Decimal)>,
}

#[derive(Args, Debug)]
struct WalletArgs {
    /// Wallet JSON-RPC endpoint.
    #[arg(long, env = "WALLET_RPC_URL", default_value = "http://127.0.0.1:8545")]
    wallet_url: String,

    /// Payer account the wallet signs for.
    #[arg(long, env = "WALLET_FROM")]
    from: Address,

    /// Chain id the tip is sent on.
    #[arg(long, env = "CHAIN_ID", default_value = "1")]
    chain_id: u64,

    /// Seconds between confirmation polls.
    #[arg(long, env = "WALLET_POLL_SECS", default_value = "2")]
    poll_secs: u64,

    /// Seconds to wait for confirmation before giving up.
    #[arg(long, env = "WALLET_TIMEOUT_SECS", default_value = "180")]
    timeout_secs: u64,
}

/// Contents of the `--config` file.
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(flatten)]
    engine: EngineConfig,
    /// Static USD quotes keyed by currency id.
    #[serde(default)]
    prices: HashMap<String, Decimal>,
    /// Static role -> addresses roster.
    #[serde(default)]
    roster: HashMap<String, Vec<String>>,
}

/// Parse a `currency=price` pair.
fn parse_price(s: &str) -> Result<(String, Decimal), String> {
    let (id, price) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid price '{}'. Use 'currency=price'.", s))?;
    let price = Decimal::from_str(price.trim())
        .map_err(|e| format!("Invalid price '{}': {}", price, e))?;
    Ok((id.trim().to_string(), price))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);
    init_metrics();

    match cli.command {
        Command::Migrate { database_url } => migrate(&database_url).await,
        Command::History {
            payer,
            limit,
            database_url,
        } => history(&database_url, PayerId(payer), limit).await,
        Command::Plan(tip) => {
            let config = load_config(&cli.config, cli.max_batch_size)?;
            plan(config, tip).await
        }
        Command::Send {
            tip,
            wallet,
            database_url,
        } => {
            let config = load_config(&cli.config, cli.max_batch_size)?;
            send(config, tip, wallet, database_url).await
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// 📋 PLAN
// ─────────────────────────────────────────────────────────────────────────────

async fn plan(config: FileConfig, tip: TipArgs) -> Result<()> {
    let executor: Arc<dyn TransactionExecutor> =
        Arc::new(SequentialExecutor::new(Arc::new(OfflineWallet)));
    let service = build_service(
        &config,
        &tip.prices,
        executor,
        Arc::new(BroadcastNotifier::new(1)),
        Arc::new(MemoryTipRecordStore::new()),
    )?;

    let request = tip_request(&service, &tip)?;
    let prepared = service.prepare(request).await.context("Tip rejected")?;

    info!(
        recipients = prepared.distribution.recipient_count,
        calls = prepared.plan.len(),
        "📋 Call plan ready"
    );
    println!("{}", serde_json::to_string_pretty(&prepared)?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// 🚀 SEND
// ─────────────────────────────────────────────────────────────────────────────

async fn send(
    config: FileConfig,
    tip: TipArgs,
    wallet_args: WalletArgs,
    database_url: Option<String>,
) -> Result<()> {
    info!("🚀 Starting tip submission");
    debug!(url = %wallet_args.wallet_url, from = %wallet_args.from, "Wallet endpoint");

    let wallet = JsonRpcWallet::new(JsonRpcWalletConfig {
        url: wallet_args.wallet_url,
        from: wallet_args.from,
        chain_id: wallet_args.chain_id,
        poll_interval: Duration::from_secs(wallet_args.poll_secs),
        confirmation_timeout: Duration::from_secs(wallet_args.timeout_secs),
    })
    .context("Failed to create wallet client")?;
    let executor = select_executor(Arc::new(wallet)).await;

    let (store, db): (Arc<dyn TipRecordStore>, Option<Database>) = match database_url {
        Some(url) => {
            debug!(database_url = %mask_password(&url), "Database endpoint");
            let db = Database::connect(&DatabaseConfig::for_cli(&url))
                .await
                .context("Failed to connect to database")?;
            info!("🗄️  Database ready");
            (Arc::new(PgTipRecordStore::new(&db)), Some(db))
        }
        None => {
            warn!("⚠️  DATABASE_URL not set, tip records are kept in memory only");
            (Arc::new(MemoryTipRecordStore::new()), None)
        }
    };

    let notifier = Arc::new(BroadcastNotifier::new(16));
    let mut events = notifier.subscribe();

    let service = build_service(&config, &tip.prices, executor, notifier, store)?;
    let request = tip_request(&service, &tip)?;

    // Interrupting mid-submission would lose track of calls already sent
    let submission = service.send(request);
    tokio::pin!(submission);
    let receipt = loop {
        tokio::select! {
            result = &mut submission => break result.context("Tip rejected")?,
            Ok(()) = signal::ctrl_c() => {
                warn!("⚠️  Submission in progress, waiting for the wallet to finish");
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        info!(
            recipients = event.recipients.len(),
            currency = %event.currency_id,
            usd = %event.usd_amount,
            "📣 Tip announced"
        );
    }

    println!("{}", serde_json::to_string_pretty(&receipt)?);

    if let Some(db) = db {
        db.close().await;
    }

    let outcome = &receipt.reconciliation;
    if !outcome.payment_may_have_gone_through() {
        bail!("{}", outcome.summary());
    }
    if !outcome.uncovered.is_empty() || outcome.unconfirmed.is_some() {
        warn!("⚠️  {}", outcome.summary());
    } else {
        info!("✅ {}", outcome.summary());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// 🗄️ DATABASE COMMANDS
// ─────────────────────────────────────────────────────────────────────────────

async fn migrate(database_url: &str) -> Result<()> {
    debug!(database_url = %mask_password(database_url), "Database endpoint");
    info!("🗄️  Connecting to database...");
    let db = Database::connect(&DatabaseConfig::for_cli(database_url))
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    db.close().await;

    info!("✅ Migrations applied");
    Ok(())
}

async fn history(database_url: &str, payer: PayerId, limit: u32) -> Result<()> {
    debug!(database_url = %mask_password(database_url), "Database endpoint");
    let db = Database::connect(&DatabaseConfig::for_cli(database_url))
        .await
        .context("Failed to connect to database")?;

    let records = PgTipRecordStore::new(&db)
        .list_tips_for_payer(&payer, limit)
        .await
        .context("Failed to load tip history")?;
    db.close().await;

    info!(payer = %payer, count = records.len(), "📜 Tip history loaded");
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Wallet used for dry runs. Reports no capabilities and submits nothing.
struct OfflineWallet;

#[async_trait::async_trait]
impl WalletTransport for OfflineWallet {
    async fn capabilities(&self) -> WalletResult<WalletCapabilities> {
        Ok(WalletCapabilities::default())
    }
}

/// Load and override the config file. Validation happens in `TipService::new`.
fn load_config(path: &Path, max_batch_size: Option<usize>) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let mut config = parse_config(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    if let Some(size) = max_batch_size {
        config.engine.max_batch_size = size;
    }
    Ok(config)
}

fn parse_config(raw: &str) -> Result<FileConfig> {
    Ok(serde_json::from_str(raw)?)
}

fn build_service(
    config: &FileConfig,
    price_overrides: &[(String, Decimal)],
    executor: Arc<dyn TransactionExecutor>,
    notifier: Arc<dyn TipNotifier>,
    store: Arc<dyn TipRecordStore>,
) -> Result<TipService> {
    let prices: StaticPriceSource = config
        .prices
        .iter()
        .map(|(id, price)| (id.clone(), *price))
        .chain(price_overrides.iter().cloned())
        .collect();
    let roster: StaticRoster = config
        .roster
        .iter()
        .map(|(role, holders)| (RoleTag(role.clone()), holders.clone()))
        .collect();

    TipService::new(
        &config.engine,
        Arc::new(prices),
        Arc::new(roster),
        executor,
        notifier,
        store,
    )
    .context("Invalid engine configuration")
}

fn tip_request(service: &TipService, tip: &TipArgs) -> Result<TipRequest> {
    let usd = parse_usd_amount(&tip.usd).context("Invalid --usd")?;
    let request = service.request(
        PayerId(tip.payer.clone()),
        recipient_selector(tip),
        usd,
        &tip.currency,
    )?;
    Ok(request)
}

fn recipient_selector(tip: &TipArgs) -> RecipientSelector {
    if tip.roles.is_empty() {
        RecipientSelector::Addresses(tip.addresses.clone())
    } else {
        RecipientSelector::Roles(tip.roles.iter().map(|r| RoleTag(r.clone())).collect())
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays machine readable
    if json {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://tip:secret@db:5432/tipjar"),
            "postgres://tip:****@db:5432/tipjar"
        );
        assert_eq!(mask_password("not a url"), "not a url");
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("eth=2500.5").unwrap(), ("eth".into(), dec!(2500.5)));
        assert!(parse_price("eth").is_err());
        assert!(parse_price("eth=abc").is_err());
    }

    #[test]
    fn test_config_file_with_static_tables() {
        let raw = r#"{
            "max_batch_size": 10,
            "distribution_contract": "0xd1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1",
            "currencies": [
                { "id": "eth", "decimals": 18, "kind": { "type": "native" } }
            ],
            "prices": { "eth": "2500" },
            "roster": { "host": ["0x0000000000000000000000000000000000000001"] }
        }"#;
        let config = parse_config(raw).unwrap();
        assert_eq!(config.engine.max_batch_size, 10);
        assert_eq!(config.engine.currencies[0].id, "eth");
        assert_eq!(config.prices["eth"], dec!(2500));
        assert_eq!(config.roster["host"].len(), 1);
    }

    // Critical: the CLI rejects --to together with --role
    #[test]
    fn test_addresses_and_roles_conflict() {
        let result = Cli::try_parse_from([
            "tipjar", "plan", "--payer", "alice", "--to", "0x01", "--role", "host", "--usd",
            "1", "--currency", "eth",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_roles_selector() {
        let cli = Cli::try_parse_from([
            "tipjar", "plan", "--payer", "alice", "--role", "host,speaker", "--usd", "1",
            "--currency", "eth",
        ])
        .unwrap();
        let Command::Plan(tip) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(
            recipient_selector(&tip),
            RecipientSelector::Roles(vec![RoleTag::from("host"), RoleTag::from("speaker")])
        );
    }
}
