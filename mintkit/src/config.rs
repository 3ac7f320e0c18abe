use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MintkitError, Result};

/// Default interval between balance/holdings refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Solana cluster the session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    Devnet,
    Testnet,
    MainnetBeta,
    Localnet,
}

impl Cluster {
    /// Public RPC endpoint for the cluster.
    pub fn rpc_url(self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
        }
    }

    /// Value of the `cluster` query parameter on explorer links.
    pub fn explorer_param(self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Localnet => "custom",
        }
    }

    /// Whether the cluster runs a faucet.
    pub fn has_faucet(self) -> bool {
        !matches!(self, Cluster::MainnetBeta)
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Localnet => "localnet",
        };
        f.write_str(s)
    }
}

impl FromStr for Cluster {
    type Err = MintkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" | "d" => Ok(Cluster::Devnet),
            "testnet" | "t" => Ok(Cluster::Testnet),
            "mainnet" | "mainnet-beta" | "m" => Ok(Cluster::MainnetBeta),
            "localnet" | "localhost" | "l" => Ok(Cluster::Localnet),
            other => Err(MintkitError::Config(format!("unknown cluster: {other}"))),
        }
    }
}

/// Configuration for a wallet session.
#[derive(Debug, Clone)]
pub struct MintkitConfig {
    /// Cluster used for explorer links and the default RPC endpoint.
    pub cluster: Cluster,
    /// RPC URL; defaults to the cluster's public endpoint if not set.
    pub rpc_url: Option<String>,
    /// Interval between periodic balance/holdings refreshes.
    pub refresh_interval: Duration,
}

impl Default for MintkitConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::Devnet,
            rpc_url: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl MintkitConfig {
    /// The effective RPC URL, validated.
    pub fn rpc_url(&self) -> Result<String> {
        let raw = self
            .rpc_url
            .as_deref()
            .unwrap_or_else(|| self.cluster.rpc_url());
        let parsed = url::Url::parse(raw)
            .map_err(|e| MintkitError::Config(format!("invalid rpc url {raw}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(raw.to_string()),
            scheme => Err(MintkitError::Config(format!(
                "unsupported rpc url scheme: {scheme}"
            ))),
        }
    }
}
