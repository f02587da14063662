use chanledger::application::app::App;
use chanledger::config::AppConfig;
use chanledger::domain::ports::StateBackendBox;
use chanledger::infrastructure::crypto::Secp256k1Verifier;
use chanledger::infrastructure::in_memory::InMemoryStateBackend;
#[cfg(feature = "storage-rocksdb")]
use chanledger::infrastructure::rocksdb::RocksDBStateBackend;
use chanledger::interfaces::csv::balance_writer::BalanceWriter;
use chanledger::interfaces::csv::genesis_reader::GenesisReader;
use chanledger::interfaces::json::tx_reader::TxReader;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Block transactions, one JSON object per line
    input: PathBuf,

    /// Initial balances CSV (address, ticker, amount)
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the chain id from the configuration
    #[arg(long)]
    chain_id: Option<String>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_backend(db_path: Option<PathBuf>) -> Result<StateBackendBox> {
    match db_path {
        Some(path) => {
            let backend = RocksDBStateBackend::open(path).into_diagnostic()?;
            Ok(Box::new(backend))
        }
        None => Ok(Box::new(InMemoryStateBackend::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_backend(db_path: Option<PathBuf>) -> Result<StateBackendBox> {
    if db_path.is_some() {
        warn!(
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
        );
    }
    Ok(Box::new(InMemoryStateBackend::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path).into_diagnostic()?,
        None => AppConfig::default(),
    };
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }

    let backend = open_backend(cli.db_path)?;
    let app = App::new(&config, backend, Arc::new(Secp256k1Verifier))
        .await
        .into_diagnostic()?;

    if let Some(path) = cli.genesis {
        let file = File::open(path).into_diagnostic()?;
        let balances = GenesisReader::new(file)
            .balances()
            .collect::<chanledger::error::Result<Vec<_>>>()
            .into_diagnostic()?;
        app.init_genesis(&balances).await.into_diagnostic()?;
        app.commit().await.into_diagnostic()?;
    }

    // Process transactions, committing whenever the block height changes
    let file = File::open(cli.input).into_diagnostic()?;
    let mut height = None;
    for item in TxReader::new(file).transactions() {
        let block_tx = match item {
            Ok(block_tx) => block_tx,
            Err(e) => {
                warn!(error = %e, "skipping unreadable transaction");
                continue;
            }
        };
        if height.is_some_and(|h| h != block_tx.height) {
            app.commit().await.into_diagnostic()?;
        }
        height = Some(block_tx.height);

        if let Err(e) = app
            .check_tx(block_tx.height, block_tx.signers.clone(), &block_tx.tx)
            .await
        {
            warn!(
                height = block_tx.height,
                code = e.abci_code(),
                log = %e.abci_log(),
                "check rejected transaction"
            );
            continue;
        }
        if let Err(e) = app
            .deliver_tx(block_tx.height, block_tx.signers, &block_tx.tx)
            .await
        {
            warn!(
                height = block_tx.height,
                code = e.abci_code(),
                log = %e.abci_log(),
                "deliver rejected transaction"
            );
        }
    }
    app.commit().await.into_diagnostic()?;

    // Output final state
    let balances = app.balances().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(&balances).into_diagnostic()?;

    Ok(())
}
