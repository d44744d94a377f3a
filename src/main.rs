use std::sync::Arc;

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};

use apinotary::archive::ipfs::IpfsBackend;
use apinotary::archive::seal::SealKey;
use apinotary::archive::ArchiveAdapter;
use apinotary::ledger::LedgerAdapter;
use apinotary::record::{Recorder, RequestSpec};
use apinotary::{NotaryConfig, NotaryError, Result, Visibility};

#[derive(Parser)]
#[command(name = "apinotary")]
#[command(about = "Notarize API calls: hash, archive to IPFS, anchor on-chain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a request and record it end-to-end
    Record {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// public, private, or shared
        #[arg(long)]
        visibility: Option<Visibility>,
    },
    /// Look up an anchored record by id
    Verify { record_id: String },
    /// Show balance, allowance, and registry statistics
    Status,
    /// Grant a viewer access to a shared record
    Grant { record_id: String, viewer: String },
    /// Revoke a viewer's access to a shared record
    Revoke { record_id: String, viewer: String },
    /// Fetch archived content by locator
    Retrieve {
        locator: String,
        #[arg(long)]
        decrypt: bool,
    },
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| NotaryError::Serialization(e.to_string()))
}

fn parse_record_id(value: &str) -> Result<U256> {
    value
        .parse()
        .map_err(|_| NotaryError::Configuration(format!("invalid record id: {value}")))
}

fn parse_viewer(value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|_| NotaryError::Configuration(format!("invalid viewer address: {value}")))
}

async fn run(cli: Cli) -> Result<()> {
    let config = NotaryConfig::from_env()?;

    let seal_key = config
        .seal_secret
        .as_ref()
        .map(|secret| SealKey::derive(secret.as_bytes()));
    let backend = Arc::new(IpfsBackend::new(config.storage.clone()));
    let archive = ArchiveAdapter::new(backend, seal_key);
    let ledger = Arc::new(LedgerAdapter::new(config.ledger.clone(), &config.signer_key_hex)?);
    let recorder = Recorder::new(archive, ledger.clone(), config.encrypt_archives);

    match cli.command {
        Commands::Record {
            url,
            method,
            visibility,
        } => {
            let spec = RequestSpec {
                url,
                method,
                headers: Vec::new(),
                body: None,
            };
            let recorded = recorder.record(&spec, visibility).await?;
            println!("{}", pretty(&recorded.receipt)?);
        }
        Commands::Verify { record_id } => {
            let id = parse_record_id(&record_id)?;
            match ledger.verify(id).await? {
                Some(record) => println!("{}", pretty(&record)?),
                None => println!("record {record_id} not found"),
            }
        }
        Commands::Status => {
            let address = ledger.address();
            let balance = ledger.balance_of(address).await?;
            let allowance = ledger.allowance().await?;
            let pricing = ledger.pricing_info().await?;
            let stats = ledger.statistics().await?;
            let records = ledger.user_record_count(address).await?;
            println!("signer:        {address}");
            println!("balance:       {balance}");
            println!("allowance:     {allowance}");
            println!("single price:  {}", pricing.single_price);
            println!("batch price:   {}", pricing.batch_price);
            println!("your records:  {records}");
            println!("total records: {}", stats.total_records);
            println!("total batches: {}", stats.total_batches);
            println!("tokens burned: {}", stats.tokens_burned);
        }
        Commands::Grant { record_id, viewer } => {
            let tx = ledger
                .grant_access(parse_record_id(&record_id)?, parse_viewer(&viewer)?)
                .await?;
            println!("access granted in {tx}");
        }
        Commands::Revoke { record_id, viewer } => {
            let tx = ledger
                .revoke_access(parse_record_id(&record_id)?, parse_viewer(&viewer)?)
                .await?;
            println!("access revoked in {tx}");
        }
        Commands::Retrieve { locator, decrypt } => {
            let content = recorder.archive().retrieve(&locator, decrypt).await?;
            match String::from_utf8(content) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("content is not UTF-8 ({} bytes)", e.as_bytes().len()),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apinotary=info".into()),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
