//! Form layer over a [`WalletSession`].
//!
//! Each form validates its raw input locally, runs the matching token
//! operation, then records the outcome in the session history and publishes
//! a notice. Precondition failures never reach the chain.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::error::{MintkitError, Result};
use crate::session::WalletSession;
use crate::token;
use crate::types::{
    CreatedToken, MintReceipt, Notice, OperationOutcome, TokenConfig, TokenHolding,
    TransferReceipt, DEFAULT_DECIMALS, MAX_DECIMALS,
};
use crate::utils::{exact_base_units, parse_address};

/// Raw input of the create-token form.
#[derive(Debug, Clone, Default)]
pub struct CreateTokenForm {
    pub name: String,
    pub symbol: String,
    /// Defaults to 9 when unset.
    pub decimals: Option<u8>,
}

impl CreateTokenForm {
    pub fn validate(&self) -> Result<TokenConfig> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(MintkitError::MissingField("name"));
        }
        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(MintkitError::MissingField("symbol"));
        }
        let decimals = self.decimals.unwrap_or(DEFAULT_DECIMALS);
        if decimals > MAX_DECIMALS {
            return Err(MintkitError::InvalidDecimals(decimals));
        }
        Ok(TokenConfig::new(name, symbol, decimals))
    }
}

/// Raw input of the mint form.
#[derive(Debug, Clone, Default)]
pub struct MintForm {
    pub mint: String,
    pub amount: String,
}

impl MintForm {
    pub fn validate(&self) -> Result<(Pubkey, Decimal)> {
        let mint = required_address("mint", &self.mint)?;
        let amount = positive_amount(&self.amount)?;
        Ok((mint, amount))
    }
}

/// Raw input of the send form.
#[derive(Debug, Clone, Default)]
pub struct SendForm {
    pub mint: String,
    pub recipient: String,
    pub amount: String,
}

/// A validated send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendRequest {
    pub mint: Pubkey,
    pub recipient: Pubkey,
    pub amount: Decimal,
}

impl SendForm {
    /// Field checks only; the balance check needs the session.
    pub fn validate(&self) -> Result<SendRequest> {
        let mint = required_address("mint", &self.mint)?;
        let recipient = required_address("recipient", &self.recipient)?;
        let amount = positive_amount(&self.amount)?;
        Ok(SendRequest {
            mint,
            recipient,
            amount,
        })
    }
}

fn required_address(field: &'static str, raw: &str) -> Result<Pubkey> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MintkitError::MissingField(field));
    }
    parse_address(raw)
}

fn positive_amount(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MintkitError::MissingField("amount"));
    }
    let amount = Decimal::from_str(raw)
        .map_err(|e| MintkitError::InvalidAmount(format!("{raw}: {e}")))?;
    if amount <= Decimal::ZERO {
        return Err(MintkitError::InvalidAmount(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    Ok(amount)
}

/// `amount` must not exceed what the session knows the wallet holds.
fn check_balance(amount: Decimal, holding: Option<&TokenHolding>) -> Result<()> {
    let available = holding.map(|h| h.balance).unwrap_or(Decimal::ZERO);
    if amount > available {
        return Err(MintkitError::InsufficientBalance {
            requested: amount,
            available,
        });
    }
    Ok(())
}

/// Marks a form in flight; cleared on drop.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, form: &'static str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MintkitError::Busy(form))?;
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Any form submission.
#[derive(Debug, Clone)]
pub enum DeskRequest {
    Create(CreateTokenForm),
    Mint(MintForm),
    Send(SendForm),
}

pub struct TokenDesk {
    session: Arc<WalletSession>,
    creating: AtomicBool,
    minting: AtomicBool,
    sending: AtomicBool,
}

impl TokenDesk {
    pub fn new(session: Arc<WalletSession>) -> Self {
        Self {
            session,
            creating: AtomicBool::new(false),
            minting: AtomicBool::new(false),
            sending: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub async fn submit(&self, request: DeskRequest) -> Result<OperationOutcome> {
        match request {
            DeskRequest::Create(form) => self.create(form).await.map(OperationOutcome::Created),
            DeskRequest::Mint(form) => self.mint(form).await.map(OperationOutcome::Minted),
            DeskRequest::Send(form) => self.send(form).await.map(OperationOutcome::Sent),
        }
    }

    /// Create a mint and remember its name and symbol.
    pub async fn create(&self, form: CreateTokenForm) -> Result<CreatedToken> {
        let result = self.run_create(&form).await;
        self.report(result)
    }

    /// Mint new supply into the wallet's own holding account.
    pub async fn mint(&self, form: MintForm) -> Result<MintReceipt> {
        let result = self.run_mint(&form).await;
        self.report(result)
    }

    /// Send tokens to another wallet.
    pub async fn send(&self, form: SendForm) -> Result<TransferReceipt> {
        let result = self.run_send(&form).await;
        self.report(result)
    }

    /// Holdings the wallet can mint more of.
    pub async fn mintable_tokens(&self) -> Result<Vec<TokenHolding>> {
        let owner = self.require_identity().await?;
        let mut holdings = token::fetch_mintable_tokens(self.session.chain(), &owner).await?;
        self.session.labels().await.apply(&mut holdings);
        Ok(holdings)
    }

    /// Holdings with a positive balance, from the session's last refresh.
    pub async fn sendable_tokens(&self) -> Vec<TokenHolding> {
        self.session
            .holdings()
            .await
            .into_iter()
            .filter(|h| h.balance > Decimal::ZERO)
            .collect()
    }

    async fn run_create(&self, form: &CreateTokenForm) -> Result<CreatedToken> {
        let _busy = BusyGuard::acquire(&self.creating, "create")?;
        self.require_identity().await?;
        let config = form.validate()?;

        let created = token::create_token(
            self.session.chain(),
            self.session.wallet(),
            &config,
            self.session.cluster(),
        )
        .await?;

        self.session
            .label_token(&created.mint, created.label.clone())
            .await;
        self.complete(OperationOutcome::Created(created.clone()))
            .await;
        Ok(created)
    }

    async fn run_mint(&self, form: &MintForm) -> Result<MintReceipt> {
        let _busy = BusyGuard::acquire(&self.minting, "mint")?;
        self.require_identity().await?;
        let (mint, amount) = form.validate()?;
        // A held mint's decimals are already known; otherwise the lookup in
        // `mint_tokens` enforces the same bound before anything is sent.
        if let Some(holding) = self.session.holding(&mint).await {
            exact_base_units(amount, holding.decimals)?;
        }

        let receipt = token::mint_tokens(
            self.session.chain(),
            self.session.wallet(),
            &mint,
            amount,
            self.session.cluster(),
        )
        .await?;

        self.complete(OperationOutcome::Minted(receipt.clone()))
            .await;
        Ok(receipt)
    }

    async fn run_send(&self, form: &SendForm) -> Result<TransferReceipt> {
        let _busy = BusyGuard::acquire(&self.sending, "send")?;
        self.require_identity().await?;
        let request = form.validate()?;
        let holding = self.session.holding(&request.mint).await;
        check_balance(request.amount, holding.as_ref())?;
        if let Some(holding) = &holding {
            exact_base_units(request.amount, holding.decimals)?;
        }

        let receipt = token::send_tokens(
            self.session.chain(),
            self.session.wallet(),
            &request.mint,
            &request.recipient,
            request.amount,
            self.session.cluster(),
        )
        .await?;

        self.complete(OperationOutcome::Sent(receipt.clone())).await;
        Ok(receipt)
    }

    async fn require_identity(&self) -> Result<Pubkey> {
        self.session
            .identity()
            .await
            .ok_or(MintkitError::WalletNotConnected)
    }

    /// Record a successful outcome, announce it and pick up the new balances.
    async fn complete(&self, outcome: OperationOutcome) {
        self.session.add_action(outcome.to_action(Utc::now())).await;
        self.session.notify(Notice::success(outcome.message()));
        // A failed refresh is already reported as a notice.
        if let Err(e) = self.session.refresh_holdings().await {
            debug!(error = %e, "post-operation refresh failed");
        }
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_precondition() {
                debug!(error = %e, "form rejected");
            } else {
                warn!(error = %e, "operation failed");
            }
            self.session.notify(Notice::error(e.to_string()));
        }
        result
    }
}
