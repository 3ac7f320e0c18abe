use mintkit::MintkitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("{0}")]
    Mintkit(#[from] MintkitError),

    #[error("no wallet: pass --keypair or set PRIVATE_KEY")]
    NoWallet,

    #[error("invalid input: {0}")]
    Input(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeskError>;
