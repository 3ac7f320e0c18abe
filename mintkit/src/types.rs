use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::utils::format_address;

/// Default decimal precision for new mints.
pub const DEFAULT_DECIMALS: u8 = 9;

/// Largest decimal precision accepted for new mints.
pub const MAX_DECIMALS: u8 = 9;

/// Serialize a `Pubkey` as its base58 string.
pub(crate) mod pubkey_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Off-chain display metadata for a mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLabel {
    pub name: String,
    pub symbol: String,
}

/// Parameters of the create-token flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenConfig {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }

    pub fn label(&self) -> TokenLabel {
        TokenLabel {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

/// One wallet's balance of one mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    #[serde(with = "pubkey_str")]
    pub mint: Pubkey,
    /// Balance in human units (`amount / 10^decimals`).
    pub balance: Decimal,
    /// Address of the holding account.
    #[serde(with = "pubkey_str")]
    pub account: Pubkey,
    /// Balance in base units.
    pub amount: u64,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<TokenLabel>,
}

impl TokenHolding {
    /// `SYMBOL` if labelled, otherwise the shortened mint address.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.symbol.clone(),
            None => format_address(&self.mint.to_string()),
        }
    }
}

/// On-chain facts about a mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    #[serde(with = "pubkey_str")]
    pub mint: Pubkey,
    /// Supply in human units.
    pub supply: Decimal,
    pub decimals: u8,
    pub is_initialized: bool,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
}

/// Result of a successful create-token flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedToken {
    #[serde(with = "pubkey_str")]
    pub mint: Pubkey,
    /// The creator's own holding account for the new mint.
    #[serde(with = "pubkey_str")]
    pub token_account: Pubkey,
    pub label: TokenLabel,
    pub decimals: u8,
    pub signature: String,
    pub explorer_url: String,
}

/// Result of a successful mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintReceipt {
    #[serde(with = "pubkey_str")]
    pub mint: Pubkey,
    #[serde(with = "pubkey_str")]
    pub token_account: Pubkey,
    pub amount: Decimal,
    pub base_amount: u64,
    pub signature: String,
    pub explorer_url: String,
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    #[serde(with = "pubkey_str")]
    pub mint: Pubkey,
    #[serde(with = "pubkey_str")]
    pub recipient: Pubkey,
    #[serde(with = "pubkey_str")]
    pub recipient_account: Pubkey,
    /// Whether the transaction also created the recipient's holding account.
    pub created_recipient_account: bool,
    pub amount: Decimal,
    pub base_amount: u64,
    pub signature: String,
    pub explorer_url: String,
}

/// Success payload of a desk operation, one variant per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Created(CreatedToken),
    Minted(MintReceipt),
    Sent(TransferReceipt),
}

impl OperationOutcome {
    /// Text of the success notice.
    pub fn message(&self) -> String {
        match self {
            OperationOutcome::Created(c) => {
                format!("Token {} created successfully!", c.label.symbol)
            }
            OperationOutcome::Minted(m) => format!("Successfully minted {} tokens!", m.amount),
            OperationOutcome::Sent(s) => format!(
                "Successfully sent {} tokens to {}!",
                s.amount,
                format_address(&s.recipient.to_string())
            ),
        }
    }

    /// History entry for this outcome.
    pub fn to_action(&self, timestamp: DateTime<Utc>) -> ActionRecord {
        let detail = match self {
            OperationOutcome::Created(c) => ActionDetail::TokenCreated {
                mint: c.mint,
                token_account: c.token_account,
                label: c.label.clone(),
                decimals: c.decimals,
                signature: c.signature.clone(),
                explorer_url: c.explorer_url.clone(),
            },
            OperationOutcome::Minted(m) => ActionDetail::TokensMinted {
                mint: m.mint,
                amount: m.amount,
                signature: m.signature.clone(),
                explorer_url: m.explorer_url.clone(),
            },
            OperationOutcome::Sent(s) => ActionDetail::TokensSent {
                mint: s.mint,
                amount: s.amount,
                recipient: s.recipient,
                signature: s.signature.clone(),
                explorer_url: s.explorer_url.clone(),
            },
        };
        ActionRecord { timestamp, detail }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Creation,
    Mint,
    Transfer,
}

/// Kind-specific payload of a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionDetail {
    TokenCreated {
        #[serde(with = "pubkey_str")]
        mint: Pubkey,
        #[serde(with = "pubkey_str")]
        token_account: Pubkey,
        label: TokenLabel,
        decimals: u8,
        signature: String,
        explorer_url: String,
    },
    TokensMinted {
        #[serde(with = "pubkey_str")]
        mint: Pubkey,
        amount: Decimal,
        signature: String,
        explorer_url: String,
    },
    TokensSent {
        #[serde(with = "pubkey_str")]
        mint: Pubkey,
        amount: Decimal,
        #[serde(with = "pubkey_str")]
        recipient: Pubkey,
        signature: String,
        explorer_url: String,
    },
}

/// An entry of the session's action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: ActionDetail,
}

impl ActionRecord {
    pub fn kind(&self) -> ActionKind {
        match self.detail {
            ActionDetail::TokenCreated { .. } => ActionKind::Creation,
            ActionDetail::TokensMinted { .. } => ActionKind::Mint,
            ActionDetail::TokensSent { .. } => ActionKind::Transfer,
        }
    }

    pub fn mint(&self) -> &Pubkey {
        match &self.detail {
            ActionDetail::TokenCreated { mint, .. }
            | ActionDetail::TokensMinted { mint, .. }
            | ActionDetail::TokensSent { mint, .. } => mint,
        }
    }

    pub fn explorer_url(&self) -> &str {
        match &self.detail {
            ActionDetail::TokenCreated { explorer_url, .. }
            | ActionDetail::TokensMinted { explorer_url, .. }
            | ActionDetail::TokensSent { explorer_url, .. } => explorer_url,
        }
    }

    /// One-line human description, e.g. `Minted 150 of Toke...Q5DA`.
    pub fn summary(&self) -> String {
        match &self.detail {
            ActionDetail::TokenCreated {
                mint,
                label,
                decimals,
                ..
            } => format!(
                "Created {} ({}) {} with {decimals} decimals",
                label.name,
                label.symbol,
                format_address(&mint.to_string())
            ),
            ActionDetail::TokensMinted { mint, amount, .. } => {
                format!("Minted {amount} of {}", format_address(&mint.to_string()))
            }
            ActionDetail::TokensSent {
                mint,
                amount,
                recipient,
                ..
            } => format!(
                "Sent {amount} of {} to {}",
                format_address(&mint.to_string()),
                format_address(&recipient.to_string())
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
