//! Chain RPC seam.
//!
//! [`ChainClient`] is the narrow set of queries and submissions the token
//! operations need. [`RpcChainClient`] implements it over the nonblocking
//! `solana_client` RPC client; tests substitute an in-memory ledger.

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;
use tracing::debug;

use crate::error::{MintkitError, Result};

/// Decoded state of an SPL mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub address: Pubkey,
    pub decimals: u8,
    /// Total supply in base units.
    pub supply: u64,
    pub is_initialized: bool,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
}

/// A token account owned by a wallet, in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountInfo {
    /// Address of the token (holding) account itself.
    pub address: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

/// Remote chain capabilities consumed by the token operations and session.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance in lamports.
    async fn get_balance(&self, owner: &Pubkey) -> Result<u64>;

    /// Load and decode a mint account.
    async fn get_mint(&self, mint: &Pubkey) -> Result<MintInfo>;

    /// Whether any account exists at `address`.
    async fn account_exists(&self, address: &Pubkey) -> Result<bool>;

    /// All token accounts owned by `owner` under the SPL token program.
    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<TokenAccountInfo>>;

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64>;

    async fn get_latest_blockhash(&self) -> Result<Hash>;

    /// Submit a fully signed transaction and wait for confirmation.
    async fn send_and_confirm_transaction(&self, tx: &Transaction) -> Result<Signature>;

    /// Request lamports from the cluster faucet and wait for confirmation.
    async fn request_airdrop(&self, owner: &Pubkey, lamports: u64) -> Result<Signature>;
}

/// [`ChainClient`] backed by a JSON-RPC endpoint.
pub struct RpcChainClient {
    rpc: RpcClient,
}

impl RpcChainClient {
    /// Connect to `url` with `confirmed` commitment.
    pub fn new(url: &str) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(url.to_string(), CommitmentConfig::confirmed()),
        }
    }

    pub fn url(&self) -> String {
        self.rpc.url()
    }
}

fn remote(context: &str, e: ClientError) -> MintkitError {
    debug!(context, error = %e, "rpc call failed");
    MintkitError::from_remote(e.to_string())
}

/// Pull the fields we need out of a `jsonParsed` token account.
fn parse_token_account(address: &str, data: &serde_json::Value) -> Result<TokenAccountInfo> {
    let info = &data["parsed"]["info"];
    let field = |v: &serde_json::Value, name: &str| -> Result<String> {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| MintkitError::Rpc(format!("token account {address}: missing {name}")))
    };

    let mint = field(&info["mint"], "mint")?;
    let owner = field(&info["owner"], "owner")?;
    let amount = field(&info["tokenAmount"]["amount"], "tokenAmount.amount")?;
    let decimals = info["tokenAmount"]["decimals"]
        .as_u64()
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| MintkitError::Rpc(format!("token account {address}: missing decimals")))?;

    let parse_key = |s: &str| -> Result<Pubkey> {
        s.parse::<Pubkey>()
            .map_err(|_| MintkitError::InvalidAddress(s.to_string()))
    };

    Ok(TokenAccountInfo {
        address: parse_key(address)?,
        mint: parse_key(mint.as_str())?,
        owner: parse_key(owner.as_str())?,
        amount: amount
            .parse()
            .map_err(|e| MintkitError::Rpc(format!("token account {address}: bad amount: {e}")))?,
        decimals,
    })
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_balance(&self, owner: &Pubkey) -> Result<u64> {
        self.rpc
            .get_balance(owner)
            .await
            .map_err(|e| remote("get balance", e))
    }

    async fn get_mint(&self, mint: &Pubkey) -> Result<MintInfo> {
        let data = self
            .rpc
            .get_account_data(mint)
            .await
            .map_err(|e| remote("get mint", e))?;
        let state = Mint::unpack(&data)
            .map_err(|e| MintkitError::Rpc(format!("account {mint} is not a mint: {e}")))?;
        Ok(MintInfo {
            address: *mint,
            decimals: state.decimals,
            supply: state.supply,
            is_initialized: state.is_initialized,
            mint_authority: state.mint_authority.into(),
            freeze_authority: state.freeze_authority.into(),
        })
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await
            .map_err(|e| remote("get account", e))?;
        Ok(response.value.is_some())
    }

    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<TokenAccountInfo>> {
        let keyed = self
            .rpc
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(spl_token::id()))
            .await
            .map_err(|e| remote("get token accounts", e))?;

        debug!(owner = %owner, count = keyed.len(), "token accounts fetched");

        keyed
            .iter()
            .map(|k| {
                let data = serde_json::to_value(&k.account.data)?;
                parse_token_account(&k.pubkey, &data)
            })
            .collect()
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        self.rpc
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| remote("get rent", e))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| remote("get blockhash", e))
    }

    async fn send_and_confirm_transaction(&self, tx: &Transaction) -> Result<Signature> {
        self.rpc
            .send_and_confirm_transaction(tx)
            .await
            .map_err(|e| remote("send tx", e))
    }

    async fn request_airdrop(&self, owner: &Pubkey, lamports: u64) -> Result<Signature> {
        let signature = self
            .rpc
            .request_airdrop(owner, lamports)
            .await
            .map_err(|e| remote("request airdrop", e))?;
        self.rpc
            .poll_for_signature_with_commitment(&signature, self.rpc.commitment())
            .await
            .map_err(|e| remote("confirm airdrop", e))?;
        Ok(signature)
    }
}
