use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mintdesk: create, mint and send SPL tokens from the terminal.
#[derive(Parser, Debug)]
#[command(name = "mintdesk", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Cluster (devnet, testnet, mainnet-beta, localnet)
    #[arg(long, default_value = "devnet", global = true)]
    pub cluster: String,

    /// RPC endpoint, overriding the cluster default
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Solana CLI keypair file; falls back to PRIVATE_KEY
    #[arg(long, global = true)]
    pub keypair: Option<PathBuf>,

    /// Seconds between background balance/holdings refreshes
    #[arg(long, default_value_t = 30, global = true)]
    pub refresh_secs: u64,

    /// JSON file holding token names and symbols
    #[arg(long, global = true)]
    pub labels: Option<PathBuf>,

    /// Output as JSON instead of TSV
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the wallet's SOL balance
    Balance,

    /// List the wallet's token holdings
    Tokens,

    /// Show supply, decimals and authorities of a mint
    Info(InfoArgs),

    /// Create a new token mint owned by the wallet
    Create(CreateArgs),

    /// Mint new supply of a token into the wallet
    Mint(MintArgs),

    /// Send tokens to another wallet
    Send(SendArgs),

    /// Request SOL from the cluster faucet
    Airdrop(AirdropArgs),

    /// Print balance and holdings on every refresh until interrupted
    Watch,

    /// Interactive session
    Shell,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Mint address
    pub mint: String,
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Token name
    #[arg(long)]
    pub name: String,

    /// Token symbol
    #[arg(long)]
    pub symbol: String,

    /// Decimal places (0-9)
    #[arg(long)]
    pub decimals: Option<u8>,
}

#[derive(Parser, Debug)]
pub struct MintArgs {
    /// Mint address
    pub mint: String,

    /// Amount in token units (e.g. 150 or 1.5)
    pub amount: String,
}

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Mint address
    pub mint: String,

    /// Recipient wallet address
    pub recipient: String,

    /// Amount in token units
    pub amount: String,
}

#[derive(Parser, Debug)]
pub struct AirdropArgs {
    /// Amount of SOL
    #[arg(default_value = "1")]
    pub sol: String,
}
