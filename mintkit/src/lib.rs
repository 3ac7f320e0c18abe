pub mod chain;
pub mod config;
pub mod desk;
pub mod error;
pub mod labels;
pub mod session;
pub mod token;
pub mod types;
pub mod utils;
pub mod wallet;

// ---- Top-level re-exports for ergonomic usage ----

// Config + errors
pub use config::{Cluster, MintkitConfig};
pub use error::{MintkitError, Result};

// Chain + wallet seams
pub use chain::{ChainClient, MintInfo, RpcChainClient, TokenAccountInfo};
pub use wallet::{KeypairWallet, WalletAdapter, WalletRegistry};

// Session + forms
pub use desk::{CreateTokenForm, DeskRequest, MintForm, SendForm, TokenDesk};
pub use labels::LabelBook;
pub use session::{Connectivity, SessionSnapshot, WalletSession};

// Token data
pub use types::{TokenConfig, TokenHolding, TokenLabel, TokenMetadata};

// Operation results + history
pub use types::{
    ActionDetail, ActionKind, ActionRecord, CreatedToken, MintReceipt, OperationOutcome,
    TransferReceipt,
};

// Notices
pub use types::{Notice, NoticeLevel};
