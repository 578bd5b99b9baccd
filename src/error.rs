use ethers_core::types::U256;
use ethers_signers::WalletError;

use crate::eip712::TypedDataError;

/// Boxed collaborator error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// GSN client error
#[derive(Debug, thiserror::Error)]
pub enum GsnError {
    /// No account bound to the network
    #[error("Account does not exist")]
    InvalidState,
    /// Transfer exceeds holdings
    #[error("Insufficient balance: have {balance}, need {amount}")]
    InsufficientBalance {
        /// Current token balance
        balance: U256,
        /// Requested transfer amount
        amount: U256,
    },
    /// Faucet was already claimed for this account
    #[error("Account already dusted, balance is {balance}")]
    PriorClaim {
        /// Current token balance
        balance: U256,
    },
    /// Relay server answered with an error payload
    #[error("RelayError: {0}")]
    RelayRejected(String),
    /// Malformed or unsupported input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Opaque failure from the node collaborator
    #[error("RPC failure: {0}")]
    Rpc(BoxError),
    /// reqwest
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// serde_json
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// ABI encoding or decoding
    #[error("{0}")]
    Abi(#[from] ethers_core::abi::Error),
    /// Signer errored
    #[error("{0}")]
    Signer(#[from] WalletError),
    /// Typed data could not be encoded
    #[error("{0}")]
    TypedData(#[from] TypedDataError),
}

impl GsnError {
    /// Wrap a collaborator error
    pub fn rpc<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Rpc(err.into())
    }
}

impl From<hex::FromHexError> for GsnError {
    fn from(e: hex::FromHexError) -> Self {
        Self::InvalidArgument(format!("invalid hex: {}", e))
    }
}

/// Crate result alias
pub type Result<T, E = GsnError> = std::result::Result<T, E>;
