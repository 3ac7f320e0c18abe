//! Wallet adapter seam.
//!
//! The session treats a wallet as an opaque capability provider: it hands
//! out an identity once connected and adds its signature to transactions.
//! [`KeypairWallet`] is the local implementation backed by a keypair.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use solana_sdk::transaction::Transaction;
use tracing::{debug, info};

use crate::error::{MintkitError, Result};
use crate::utils::{format_address, keypair_from_private_key};

/// Adapter name of a wallet loaded from a keypair file.
pub const FILE_WALLET: &str = "file";

/// Adapter name of a wallet loaded from the `PRIVATE_KEY` variable.
pub const ENV_WALLET: &str = "env";

#[async_trait]
pub trait WalletAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Identity while connected, `None` otherwise.
    fn pubkey(&self) -> Option<Pubkey>;

    async fn connect(&self) -> Result<Pubkey>;

    async fn disconnect(&self) -> Result<()>;

    /// Add this wallet's signature to `tx`, keeping any signatures already present.
    async fn sign_transaction(&self, tx: &mut Transaction) -> Result<()>;
}

/// Wallet that signs with a keypair held in memory.
pub struct KeypairWallet {
    name: String,
    keypair: Keypair,
    connected: AtomicBool,
}

impl KeypairWallet {
    pub fn new(name: impl Into<String>, keypair: Keypair) -> Self {
        Self {
            name: name.into(),
            keypair,
            connected: AtomicBool::new(false),
        }
    }

    /// Load from a bs58-encoded private key.
    pub fn from_private_key(name: impl Into<String>, private_key: &str) -> Result<Self> {
        Ok(Self::new(name, keypair_from_private_key(private_key)?))
    }

    /// Load from a Solana CLI keypair file (JSON byte array).
    pub fn from_file(path: &Path) -> Result<Self> {
        let keypair = read_keypair_file(path).map_err(|e| {
            MintkitError::Wallet(format!("read keypair {}: {e}", path.display()))
        })?;
        Ok(Self::new(FILE_WALLET, keypair))
    }

    /// The keypair's public key, regardless of connection state.
    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletAdapter for KeypairWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn pubkey(&self) -> Option<Pubkey> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.keypair.pubkey())
    }

    async fn connect(&self) -> Result<Pubkey> {
        self.connected.store(true, Ordering::SeqCst);
        let pubkey = self.keypair.pubkey();
        info!(wallet = %self.name, address = %format_address(&pubkey.to_string()), "wallet connected");
        Ok(pubkey)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!(wallet = %self.name, "wallet disconnected");
        Ok(())
    }

    async fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MintkitError::WalletNotConnected);
        }
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| MintkitError::Signing(e.to_string()))?;
        debug!(wallet = %self.name, "transaction signed");
        Ok(())
    }
}

/// The wallets available to a session, in registration order.
#[derive(Default)]
pub struct WalletRegistry {
    adapters: Vec<Arc<dyn WalletAdapter>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. A later adapter with the same name replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn WalletAdapter>) {
        self.adapters.retain(|a| a.name() != adapter.name());
        self.adapters.push(adapter);
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WalletAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// The `preferred` adapter if registered, otherwise the first one.
    pub fn select_default(&self, preferred: &str) -> Option<Arc<dyn WalletAdapter>> {
        self.get(preferred).or_else(|| self.adapters.first().cloned())
    }
}
