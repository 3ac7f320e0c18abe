use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mintkit::wallet::{ENV_WALLET, FILE_WALLET};
use mintkit::{
    Cluster, KeypairWallet, LabelBook, MintkitConfig, Notice, RpcChainClient, TokenDesk, WalletAdapter,
    WalletRegistry, WalletSession,
};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::error::{DeskError, Result};

/// Session, desk and label file wired up from the command line.
pub struct App {
    pub session: Arc<WalletSession>,
    pub desk: TokenDesk,
    labels_path: Option<PathBuf>,
}

impl App {
    pub fn build(cli: &Cli) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present

        let cluster: Cluster = cli.cluster.parse()?;
        let config = MintkitConfig {
            cluster,
            rpc_url: cli.rpc_url.clone(),
            refresh_interval: Duration::from_secs(cli.refresh_secs.max(1)),
        };
        let rpc_url = config.rpc_url()?;
        info!(%cluster, rpc_url = %rpc_url, "using cluster");

        let chain = Arc::new(RpcChainClient::new(&rpc_url));
        let wallet = select_wallet(cli.keypair.as_deref())?;
        let session = Arc::new(WalletSession::new(chain, wallet, &config));

        Ok(Self {
            desk: TokenDesk::new(session.clone()),
            session,
            labels_path: cli.labels.clone(),
        })
    }

    /// Load saved labels and connect the wallet.
    pub async fn start(&self) -> Result<Pubkey> {
        if let Some(path) = &self.labels_path {
            let labels = LabelBook::load(path)?;
            debug!(count = labels.len(), "labels loaded");
            self.session.set_labels(labels).await;
        }
        Ok(self.session.connect().await?)
    }

    /// Persist labels if a label file was given.
    pub async fn save_labels(&self) -> Result<()> {
        let Some(path) = &self.labels_path else {
            return Ok(());
        };
        if let Err(e) = self.session.labels().await.save(path) {
            self.session
                .notify(Notice::error(format!("Failed to save labels: {e}")));
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.save_labels().await?;
        self.session.disconnect().await?;
        Ok(())
    }
}

/// The keypair file wallet if given, otherwise the `PRIVATE_KEY` wallet.
fn select_wallet(keypair: Option<&Path>) -> Result<Arc<dyn WalletAdapter>> {
    let mut registry = WalletRegistry::new();

    if let Ok(private_key) = std::env::var("PRIVATE_KEY") {
        registry.register(Arc::new(KeypairWallet::from_private_key(
            ENV_WALLET,
            private_key.trim(),
        )?));
    }
    if let Some(path) = keypair {
        registry.register(Arc::new(KeypairWallet::from_file(path)?));
    }

    let wallet = registry
        .select_default(FILE_WALLET)
        .ok_or(DeskError::NoWallet)?;
    debug!(wallet = wallet.name(), available = ?registry.names(), "wallet selected");
    Ok(wallet)
}
