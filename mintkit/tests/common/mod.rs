//! In-memory ledger implementing `ChainClient`.
//!
//! Interprets the system, token and associated-token-account instructions
//! the token operations emit, verifies signatures, and applies each
//! transaction atomically.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mintkit::{
    ChainClient, KeypairWallet, MintInfo, MintkitConfig, MintkitError, Result, TokenAccountInfo,
    WalletSession,
};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use spl_token::instruction::TokenInstruction;
use spl_token::solana_program::program_option::COption;

#[derive(Debug, Clone)]
struct MintState {
    decimals: u8,
    supply: u64,
    mint_authority: Option<Pubkey>,
    freeze_authority: Option<Pubkey>,
}

#[derive(Debug, Clone)]
struct TokenAccountState {
    mint: Pubkey,
    owner: Pubkey,
    amount: u64,
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    lamports: BTreeMap<Pubkey, u64>,
    mints: BTreeMap<Pubkey, MintState>,
    token_accounts: BTreeMap<Pubkey, TokenAccountState>,
}

fn rejected(detail: &str) -> MintkitError {
    MintkitError::from_remote(format!(
        "Transaction simulation failed: Error processing Instruction 0: {detail}"
    ))
}

fn coption(key: COption<Pubkey>) -> Option<Pubkey> {
    match key {
        COption::Some(k) => Some(k),
        COption::None => None,
    }
}

impl Ledger {
    fn apply(&mut self, program: &Pubkey, accounts: &[Pubkey], data: &[u8]) -> Result<()> {
        if *program == solana_sdk::system_program::id() {
            // create_account: the payer funds accounts[1]; fees are not modelled.
            if let Some(new) = accounts.get(1) {
                self.lamports.entry(*new).or_insert(0);
            }
            return Ok(());
        }
        if *program == spl_associated_token_account::id() {
            return self.create_associated_account(accounts);
        }
        if *program == spl_token::id() {
            let ix = TokenInstruction::unpack(data)
                .map_err(|e| rejected(&format!("invalid token instruction: {e}")))?;
            return self.apply_token(ix, accounts);
        }
        Err(rejected(&format!("unknown program {program}")))
    }

    fn create_associated_account(&mut self, accounts: &[Pubkey]) -> Result<()> {
        let [_funder, ata, wallet, mint, ..] = accounts else {
            return Err(rejected("not enough account keys"));
        };
        if get_associated_token_address(wallet, mint) != *ata {
            return Err(rejected("invalid seeds"));
        }
        if !self.mints.contains_key(mint) {
            return Err(rejected("invalid account data for instruction"));
        }
        self.token_accounts
            .entry(*ata)
            .or_insert_with(|| TokenAccountState {
                mint: *mint,
                owner: *wallet,
                amount: 0,
            });
        Ok(())
    }

    fn apply_token(&mut self, ix: TokenInstruction, accounts: &[Pubkey]) -> Result<()> {
        match ix {
            TokenInstruction::InitializeMint {
                decimals,
                mint_authority,
                freeze_authority,
            }
            | TokenInstruction::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                let mint = accounts[0];
                if self.mints.contains_key(&mint) {
                    return Err(rejected("custom program error: 0x6"));
                }
                self.mints.insert(
                    mint,
                    MintState {
                        decimals,
                        supply: 0,
                        mint_authority: Some(mint_authority),
                        freeze_authority: coption(freeze_authority),
                    },
                );
                Ok(())
            }
            TokenInstruction::MintTo { amount } => {
                let [mint, destination, authority, ..] = accounts else {
                    return Err(rejected("not enough account keys"));
                };
                let state = self
                    .mints
                    .get_mut(mint)
                    .ok_or_else(|| rejected("invalid account data for instruction"))?;
                if state.mint_authority != Some(*authority) {
                    return Err(rejected("custom program error: 0x4"));
                }
                let account = self
                    .token_accounts
                    .get_mut(destination)
                    .ok_or_else(|| rejected("invalid account data for instruction"))?;
                if account.mint != *mint {
                    return Err(rejected("custom program error: 0x3"));
                }
                state.supply += amount;
                account.amount += amount;
                Ok(())
            }
            TokenInstruction::Transfer { amount } => {
                let [source, destination, authority, ..] = accounts else {
                    return Err(rejected("not enough account keys"));
                };
                self.transfer(source, destination, authority, amount, None)
            }
            TokenInstruction::TransferChecked { amount, decimals } => {
                let [source, mint, destination, authority, ..] = accounts else {
                    return Err(rejected("not enough account keys"));
                };
                let state = self
                    .mints
                    .get(mint)
                    .ok_or_else(|| rejected("invalid account data for instruction"))?;
                if state.decimals != decimals {
                    return Err(rejected("custom program error: 0x12"));
                }
                self.transfer(source, destination, authority, amount, Some(mint))
            }
            other => Err(rejected(&format!("unsupported instruction {other:?}"))),
        }
    }

    fn transfer(
        &mut self,
        source: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
        mint: Option<&Pubkey>,
    ) -> Result<()> {
        let from = self
            .token_accounts
            .get(source)
            .ok_or_else(|| rejected("invalid account data for instruction"))?
            .clone();
        if from.owner != *authority {
            return Err(rejected("custom program error: 0x4"));
        }
        if mint.is_some_and(|m| *m != from.mint) {
            return Err(rejected("custom program error: 0x3"));
        }
        let to = self
            .token_accounts
            .get(destination)
            .ok_or_else(|| rejected("invalid account data for instruction"))?;
        if to.mint != from.mint {
            return Err(rejected("custom program error: 0x3"));
        }
        if from.amount < amount {
            return Err(rejected("insufficient funds"));
        }
        if let Some(a) = self.token_accounts.get_mut(source) {
            a.amount -= amount;
        }
        if let Some(a) = self.token_accounts.get_mut(destination) {
            a.amount += amount;
        }
        Ok(())
    }
}

/// `ChainClient` over an in-memory ledger.
#[derive(Default)]
pub struct MemoryChain {
    ledger: Mutex<Ledger>,
    calls: Mutex<HashMap<&'static str, usize>>,
    sent: Mutex<Vec<Transaction>>,
    send_latency: Mutex<Duration>,
    read_latency: Mutex<Duration>,
    fail_next_send: Mutex<Option<String>>,
    fail_reads: Mutex<bool>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
    }

    /// Total number of calls made through `ChainClient`.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_transaction(&self) -> Option<Transaction> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Delay every `send_and_confirm_transaction` by `latency`.
    pub fn set_send_latency(&self, latency: Duration) {
        *self.send_latency.lock().unwrap() = latency;
    }

    /// Delay every `get_token_accounts_by_owner` by `latency`.
    pub fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.lock().unwrap() = latency;
    }

    /// Reject the next submitted transaction with `message`.
    pub fn fail_next_send(&self, message: &str) {
        *self.fail_next_send.lock().unwrap() = Some(message.to_string());
    }

    /// Make balance and token-account reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn fund(&self, owner: &Pubkey, lamports: u64) {
        *self
            .ledger
            .lock()
            .unwrap()
            .lamports
            .entry(*owner)
            .or_insert(0) += lamports;
    }

    /// Create `mint` (authority = `owner`) and credit `owner` with `amount` base units.
    pub fn credit(&self, owner: &Pubkey, mint: &Pubkey, decimals: u8, amount: u64) -> Pubkey {
        let mut ledger = self.ledger.lock().unwrap();
        let state = ledger.mints.entry(*mint).or_insert(MintState {
            decimals,
            supply: 0,
            mint_authority: Some(*owner),
            freeze_authority: None,
        });
        state.supply += amount;
        let account = get_associated_token_address(owner, mint);
        ledger
            .token_accounts
            .entry(account)
            .or_insert(TokenAccountState {
                mint: *mint,
                owner: *owner,
                amount: 0,
            })
            .amount += amount;
        account
    }

    /// Base-unit balance of a token account, if it exists.
    pub fn token_balance(&self, account: &Pubkey) -> Option<u64> {
        self.ledger
            .lock()
            .unwrap()
            .token_accounts
            .get(account)
            .map(|a| a.amount)
    }

    fn reads_failing(&self) -> bool {
        *self.fail_reads.lock().unwrap()
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn get_balance(&self, owner: &Pubkey) -> Result<u64> {
        self.record("get_balance");
        if self.reads_failing() {
            return Err(MintkitError::Rpc("connection refused".into()));
        }
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .lamports
            .get(owner)
            .copied()
            .unwrap_or(0))
    }

    async fn get_mint(&self, mint: &Pubkey) -> Result<MintInfo> {
        self.record("get_mint");
        let ledger = self.ledger.lock().unwrap();
        let state = ledger
            .mints
            .get(mint)
            .ok_or_else(|| MintkitError::Rpc(format!("AccountNotFound: pubkey={mint}")))?;
        Ok(MintInfo {
            address: *mint,
            decimals: state.decimals,
            supply: state.supply,
            is_initialized: true,
            mint_authority: state.mint_authority,
            freeze_authority: state.freeze_authority,
        })
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        self.record("account_exists");
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger.token_accounts.contains_key(address)
            || ledger.mints.contains_key(address)
            || ledger.lamports.contains_key(address))
    }

    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<TokenAccountInfo>> {
        self.record("get_token_accounts_by_owner");
        let latency = *self.read_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.reads_failing() {
            return Err(MintkitError::Rpc("connection refused".into()));
        }
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger
            .token_accounts
            .iter()
            .filter(|(_, a)| a.owner == *owner)
            .map(|(address, a)| TokenAccountInfo {
                address: *address,
                mint: a.mint,
                owner: a.owner,
                amount: a.amount,
                decimals: ledger.mints.get(&a.mint).map(|m| m.decimals).unwrap_or(0),
            })
            .collect())
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        self.record("get_minimum_balance_for_rent_exemption");
        Ok((data_len as u64 + 128) * 6_960)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.record("get_latest_blockhash");
        Ok(Hash::new_unique())
    }

    async fn send_and_confirm_transaction(&self, tx: &Transaction) -> Result<Signature> {
        self.record("send_and_confirm_transaction");
        let latency = *self.send_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = self.fail_next_send.lock().unwrap().take() {
            return Err(MintkitError::from_remote(message));
        }
        tx.verify()
            .map_err(|e| rejected(&format!("signature verification failed: {e}")))?;

        let keys = &tx.message.account_keys;
        let mut ledger = self.ledger.lock().unwrap();
        let mut staged = ledger.clone();
        for ix in &tx.message.instructions {
            let program = keys[ix.program_id_index as usize];
            let accounts: Vec<Pubkey> = ix.accounts.iter().map(|&i| keys[i as usize]).collect();
            staged.apply(&program, &accounts, &ix.data)?;
        }
        *ledger = staged;
        drop(ledger);

        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures[0])
    }

    async fn request_airdrop(&self, owner: &Pubkey, lamports: u64) -> Result<Signature> {
        self.record("request_airdrop");
        self.fund(owner, lamports);
        Ok(Signature::new_unique())
    }
}

/// A session on `chain` for a fresh keypair wallet, not yet connected.
pub fn session_on(chain: &Arc<MemoryChain>, keypair: Keypair) -> Arc<WalletSession> {
    let wallet = Arc::new(KeypairWallet::new("test", keypair));
    Arc::new(WalletSession::new(
        chain.clone(),
        wallet,
        &MintkitConfig::default(),
    ))
}

/// A connected session for a fresh keypair holding 2 SOL.
pub async fn connected_session(chain: &Arc<MemoryChain>) -> (Arc<WalletSession>, Pubkey) {
    let keypair = Keypair::new();
    let owner = keypair.pubkey();
    chain.fund(&owner, 2_000_000_000);
    let session = session_on(chain, keypair);
    session.connect().await.unwrap();
    (session, owner)
}
