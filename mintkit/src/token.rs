//! Token operations.
//!
//! Each operation composes a handful of chain queries and one or two signed
//! transactions into a single typed outcome. None of them touch session
//! state; recording history and notifying the user is the desk's job.

use std::collections::HashMap;

use rust_decimal::Decimal;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;
use tracing::{debug, info, warn};

use crate::chain::ChainClient;
use crate::config::Cluster;
use crate::error::{MintkitError, Result};
use crate::types::{
    CreatedToken, MintReceipt, TokenConfig, TokenHolding, TokenMetadata, TransferReceipt,
    MAX_DECIMALS,
};
use crate::utils::{exact_base_units, explorer_tx_url, from_base_units, sol_to_lamports};
use crate::wallet::WalletAdapter;

/// The wallet's identity, or `WalletNotConnected`.
pub fn connected_identity(wallet: &dyn WalletAdapter) -> Result<Pubkey> {
    wallet.pubkey().ok_or(MintkitError::WalletNotConnected)
}

fn require_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(MintkitError::InvalidAmount(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    Ok(())
}

fn instruction_error(context: &str, e: impl std::fmt::Display) -> MintkitError {
    MintkitError::Instruction(format!("{context}: {e}"))
}

/// Build, sign and submit a transaction paid for by the wallet.
///
/// `co_signers` sign before the wallet does (e.g. a fresh mint keypair).
async fn sign_and_send(
    chain: &dyn ChainClient,
    wallet: &dyn WalletAdapter,
    payer: &Pubkey,
    instructions: &[Instruction],
    co_signers: &[&Keypair],
) -> Result<Signature> {
    let blockhash = chain.get_latest_blockhash().await?;
    let mut tx = Transaction::new_with_payer(instructions, Some(payer));
    tx.message.recent_blockhash = blockhash;
    if !co_signers.is_empty() {
        tx.try_partial_sign(co_signers, blockhash)
            .map_err(|e| MintkitError::Signing(e.to_string()))?;
    }
    wallet.sign_transaction(&mut tx).await?;
    chain.send_and_confirm_transaction(&tx).await
}

/// Instructions that create and initialize a mint plus the creator's holding account.
pub fn build_create_mint_instructions(
    payer: &Pubkey,
    mint: &Pubkey,
    rent_lamports: u64,
    decimals: u8,
) -> Result<Vec<Instruction>> {
    let create_account = system_instruction::create_account(
        payer,
        mint,
        rent_lamports,
        Mint::LEN as u64,
        &spl_token::id(),
    );
    let initialize = spl_token::instruction::initialize_mint2(
        &spl_token::id(),
        mint,
        payer,
        Some(payer),
        decimals,
    )
    .map_err(|e| instruction_error("build initialize mint ix", e))?;
    let holding =
        create_associated_token_account_idempotent(payer, payer, mint, &spl_token::id());
    Ok(vec![create_account, initialize, holding])
}

/// Instructions of a token transfer, optionally creating the recipient's holding account.
///
/// Both go into one transaction so they land together or not at all.
pub fn build_transfer_instructions(
    sender: &Pubkey,
    mint: &Pubkey,
    recipient: &Pubkey,
    base_amount: u64,
    decimals: u8,
    create_recipient_account: bool,
) -> Result<Vec<Instruction>> {
    let source = get_associated_token_address(sender, mint);
    let destination = get_associated_token_address(recipient, mint);

    let mut instructions = Vec::with_capacity(2);
    if create_recipient_account {
        instructions.push(create_associated_token_account_idempotent(
            sender,
            recipient,
            mint,
            &spl_token::id(),
        ));
    }
    instructions.push(
        spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source,
            mint,
            &destination,
            sender,
            &[],
            base_amount,
            decimals,
        )
        .map_err(|e| instruction_error("build transfer ix", e))?,
    );
    Ok(instructions)
}

/// Make sure `owner` has a holding account for `mint`, creating it if absent.
///
/// Returns the account address and whether it was created.
pub async fn ensure_holding_account(
    chain: &dyn ChainClient,
    wallet: &dyn WalletAdapter,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<(Pubkey, bool)> {
    let account = get_associated_token_address(owner, mint);
    if chain.account_exists(&account).await? {
        return Ok((account, false));
    }

    debug!(%mint, %account, "creating holding account");
    let ix = create_associated_token_account_idempotent(owner, owner, mint, &spl_token::id());
    sign_and_send(chain, wallet, owner, &[ix], &[]).await?;
    Ok((account, true))
}

/// Create a new mint with the wallet as mint and freeze authority.
///
/// Name and symbol are not written on-chain; they come back in the
/// receipt's label for the caller to keep.
pub async fn create_token(
    chain: &dyn ChainClient,
    wallet: &dyn WalletAdapter,
    config: &TokenConfig,
    cluster: Cluster,
) -> Result<CreatedToken> {
    let payer = connected_identity(wallet)?;
    if config.decimals > MAX_DECIMALS {
        return Err(MintkitError::InvalidDecimals(config.decimals));
    }

    let mint_keypair = Keypair::new();
    let mint = mint_keypair.pubkey();
    let rent = chain
        .get_minimum_balance_for_rent_exemption(Mint::LEN)
        .await?;

    let instructions = build_create_mint_instructions(&payer, &mint, rent, config.decimals)?;
    let signature = sign_and_send(chain, wallet, &payer, &instructions, &[&mint_keypair]).await?;
    let signature = signature.to_string();

    info!(
        %mint,
        symbol = %config.symbol,
        decimals = config.decimals,
        signature = %signature,
        "token created"
    );

    Ok(CreatedToken {
        mint,
        token_account: get_associated_token_address(&payer, &mint),
        label: config.label(),
        decimals: config.decimals,
        explorer_url: explorer_tx_url(&signature, cluster),
        signature,
    })
}

/// Issue `amount` (human units) of new supply into the wallet's holding account.
///
/// The wallet must be the mint authority; otherwise the chain rejects it.
pub async fn mint_tokens(
    chain: &dyn ChainClient,
    wallet: &dyn WalletAdapter,
    mint: &Pubkey,
    amount: Decimal,
    cluster: Cluster,
) -> Result<MintReceipt> {
    let owner = connected_identity(wallet)?;
    require_positive(amount)?;

    let info = chain.get_mint(mint).await?;
    let base_amount = exact_base_units(amount, info.decimals)?;

    let (token_account, _) = ensure_holding_account(chain, wallet, &owner, mint).await?;

    let ix = spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        &token_account,
        &owner,
        &[],
        base_amount,
    )
    .map_err(|e| instruction_error("build mint_to ix", e))?;

    let signature = sign_and_send(chain, wallet, &owner, &[ix], &[])
        .await?
        .to_string();

    info!(%mint, %amount, base_amount, signature = %signature, "tokens minted");

    Ok(MintReceipt {
        mint: *mint,
        token_account,
        amount,
        base_amount,
        explorer_url: explorer_tx_url(&signature, cluster),
        signature,
    })
}

/// Transfer `amount` (human units) of `mint` from the wallet to `recipient`.
pub async fn send_tokens(
    chain: &dyn ChainClient,
    wallet: &dyn WalletAdapter,
    mint: &Pubkey,
    recipient: &Pubkey,
    amount: Decimal,
    cluster: Cluster,
) -> Result<TransferReceipt> {
    let owner = connected_identity(wallet)?;
    require_positive(amount)?;

    let info = chain.get_mint(mint).await?;
    let base_amount = exact_base_units(amount, info.decimals)?;

    ensure_holding_account(chain, wallet, &owner, mint).await?;

    let recipient_account = get_associated_token_address(recipient, mint);
    let create_recipient_account = !chain.account_exists(&recipient_account).await?;

    let instructions = build_transfer_instructions(
        &owner,
        mint,
        recipient,
        base_amount,
        info.decimals,
        create_recipient_account,
    )?;

    let signature = sign_and_send(chain, wallet, &owner, &instructions, &[])
        .await?
        .to_string();

    info!(
        %mint,
        %recipient,
        %amount,
        base_amount,
        created_recipient_account = create_recipient_account,
        signature = %signature,
        "tokens sent"
    );

    Ok(TransferReceipt {
        mint: *mint,
        recipient: *recipient,
        recipient_account,
        created_recipient_account: create_recipient_account,
        amount,
        base_amount,
        explorer_url: explorer_tx_url(&signature, cluster),
        signature,
    })
}

/// All holdings of `owner` under the token program.
pub async fn try_fetch_wallet_tokens(
    chain: &dyn ChainClient,
    owner: &Pubkey,
) -> Result<Vec<TokenHolding>> {
    let accounts = chain.get_token_accounts_by_owner(owner).await?;
    Ok(accounts
        .into_iter()
        .map(|a| TokenHolding {
            mint: a.mint,
            balance: from_base_units(a.amount, a.decimals),
            account: a.address,
            amount: a.amount,
            decimals: a.decimals,
            label: None,
        })
        .collect())
}

/// Like [`try_fetch_wallet_tokens`], but yields an empty list on any failure.
pub async fn fetch_wallet_tokens(chain: &dyn ChainClient, owner: &Pubkey) -> Vec<TokenHolding> {
    match try_fetch_wallet_tokens(chain, owner).await {
        Ok(holdings) => holdings,
        Err(e) => {
            warn!(%owner, error = %e, "fetching wallet tokens failed");
            Vec::new()
        }
    }
}

/// Supply, decimals and authorities of a mint; `None` if it cannot be loaded.
pub async fn fetch_token_metadata(chain: &dyn ChainClient, mint: &Pubkey) -> Option<TokenMetadata> {
    match chain.get_mint(mint).await {
        Ok(info) => Some(TokenMetadata {
            mint: *mint,
            supply: from_base_units(info.supply, info.decimals),
            decimals: info.decimals,
            is_initialized: info.is_initialized,
            mint_authority: info.mint_authority.map(|k| k.to_string()),
            freeze_authority: info.freeze_authority.map(|k| k.to_string()),
        }),
        Err(e) => {
            warn!(%mint, error = %e, "fetching token metadata failed");
            None
        }
    }
}

/// Holdings of `owner` whose mint authority is `owner`.
///
/// Mints that fail to load are skipped.
pub async fn fetch_mintable_tokens(
    chain: &dyn ChainClient,
    owner: &Pubkey,
) -> Result<Vec<TokenHolding>> {
    let holdings = try_fetch_wallet_tokens(chain, owner).await?;
    let mut authority_of: HashMap<Pubkey, Option<Pubkey>> = HashMap::new();
    let mut mintable = Vec::new();

    for holding in holdings {
        let authority = match authority_of.get(&holding.mint) {
            Some(a) => *a,
            None => {
                let a = match chain.get_mint(&holding.mint).await {
                    Ok(info) => info.mint_authority,
                    Err(e) => {
                        warn!(mint = %holding.mint, error = %e, "checking mint authority failed");
                        None
                    }
                };
                authority_of.insert(holding.mint, a);
                a
            }
        };
        if authority == Some(*owner) {
            mintable.push(holding);
        }
    }
    Ok(mintable)
}

/// Ask the cluster faucet for `sol` SOL.
pub async fn request_airdrop(
    chain: &dyn ChainClient,
    owner: &Pubkey,
    sol: Decimal,
    cluster: Cluster,
) -> Result<String> {
    if !cluster.has_faucet() {
        return Err(MintkitError::Config(format!("{cluster} has no faucet")));
    }
    require_positive(sol)?;
    let lamports = sol_to_lamports(sol)?;
    let signature = chain.request_airdrop(owner, lamports).await?.to_string();
    info!(%owner, %sol, signature = %signature, "airdrop confirmed");
    Ok(signature)
}
