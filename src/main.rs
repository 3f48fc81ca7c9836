//! Wallet Pipeline CLI
//!
//! Drives a single remotely signed account: balance checks, transfers,
//! contract calls, message signing and receipt lookups.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::format_ether;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use wallet_pipeline::config::Settings;
use wallet_pipeline::tx::TransactionRequest;
use wallet_pipeline::{metrics, Wallet};

#[derive(Parser)]
#[command(name = "wallet-pipeline")]
#[command(about = "Queued transaction submission for a remotely signed account", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $WALLET_PIPELINE_CONFIG or config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print pipeline metrics once the command completes
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account, network and balance
    Status,
    /// Transfer native currency
    Transfer {
        #[arg(long)]
        to: String,
        /// Amount in ether, e.g. 0.01
        #[arg(long)]
        amount: String,
    },
    /// Send a transaction with arbitrary calldata
    Send {
        #[arg(long)]
        to: String,
        /// Value in wei
        #[arg(long, default_value = "0")]
        value: String,
        /// Hex-encoded calldata
        #[arg(long, default_value = "0x")]
        data: String,
    },
    /// Sign a personal message
    SignMessage {
        #[arg(long)]
        message: String,
    },
    /// Wait for a transaction receipt
    Wait {
        #[arg(long)]
        hash: String,
        /// Seconds to wait before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    info!("Starting Wallet Pipeline v{}", env!("CARGO_PKG_VERSION"));

    let wallet = Wallet::connect(&settings)
        .await
        .context("Failed to initialize wallet")?;

    match cli.command {
        Commands::Status => {
            let network = wallet.network();
            let balance = wallet.get_balance().await?;
            println!("address:  {:?}", wallet.address());
            println!("chain id: {}", network.chain_id);
            if let Some(network_id) = &network.network_id {
                println!("network:  {}", network_id);
            }
            println!("balance:  {} ETH", format_ether(balance));
        }
        Commands::Transfer { to, amount } => {
            let hash = wallet.native_transfer(parse_address(&to)?, &amount).await?;
            println!("{:?}", hash);
        }
        Commands::Send { to, value, data } => {
            let value = U256::from_dec_str(&value)
                .with_context(|| format!("Invalid value: {}", value))?;
            let data: Bytes = data
                .parse()
                .with_context(|| format!("Invalid calldata: {}", data))?;

            let sent = wallet
                .send_transaction(TransactionRequest::new(parse_address(&to)?, value, data))
                .await?;
            println!("hash:   {:?}", sent.hash);
            println!("nonce:  {}", sent.nonce);
            println!("status: {:?}", sent.receipt.status);
        }
        Commands::SignMessage { message } => {
            let signature = wallet.sign_message(message.as_bytes()).await?;
            println!("{}", signature);
        }
        Commands::Wait { hash, timeout } => {
            let hash: H256 = hash
                .parse()
                .with_context(|| format!("Invalid transaction hash: {}", hash))?;
            let timeout = timeout
                .map(Duration::from_secs)
                .or_else(|| settings.receipt.timeout());

            let receipt = wallet.wait_for_transaction_receipt(hash, timeout).await?;
            println!("status: {:?}", receipt.status);
            if let Some(block) = receipt.block_number {
                println!("block:  {}", block);
            }
            if let Some(gas_used) = receipt.gas_used {
                println!("gas:    {}", gas_used);
            }
        }
    }

    if cli.metrics {
        print!("{}", metrics::render()?);
    }

    Ok(())
}

fn parse_address(value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .with_context(|| format!("Invalid address: {}", value))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wallet_pipeline=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
