use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MintkitError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("wallet already connected")]
    AlreadyConnected,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("decimals must be between 0 and 9, got {0}")]
    InvalidDecimals(u8),

    #[error("amount {requested} exceeds balance {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("another {0} request is still in flight")]
    Busy(&'static str),

    #[error("Insufficient funds for this transaction")]
    InsufficientFunds,

    #[error("Transaction expired. Please try again")]
    BlockhashExpired,

    #[error("Transaction simulation failed. Please check your inputs")]
    SimulationFailed,

    #[error("{0}")]
    Rpc(String),

    #[error("instruction error: {0}")]
    Instruction(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("overflow: {0}")]
    Overflow(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MintkitError {
    /// Classify a raw remote failure message into a typed error.
    pub fn from_remote(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("insufficient funds") {
            MintkitError::InsufficientFunds
        } else if message.contains("blockhash") {
            MintkitError::BlockhashExpired
        } else if message.contains("Transaction simulation failed") {
            MintkitError::SimulationFailed
        } else {
            MintkitError::Rpc(message)
        }
    }

    /// True for failures detected locally before any remote call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            MintkitError::WalletNotConnected
                | MintkitError::AlreadyConnected
                | MintkitError::MissingField(_)
                | MintkitError::InvalidAddress(_)
                | MintkitError::InvalidAmount(_)
                | MintkitError::InvalidDecimals(_)
                | MintkitError::InsufficientBalance { .. }
                | MintkitError::Busy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MintkitError>;
