use serde::{Deserialize, Serialize};

/// EIP-1193 error code for a request the user declined in the wallet.
pub const USER_REJECTED_REQUEST: i64 = 4001;

/// Errors raised by the gateway and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// Wallet handshake failed, was rejected, or the wallet is absent
    #[error("Connector error: {0}")]
    Connector(String),

    /// RPC or socket endpoint unreachable or malformed
    #[error("Chain client error: {0}")]
    ChainClient(String),

    /// No wallet mechanism is present where one is required
    #[error("No wallet available: {0}")]
    NoWallet(String),

    /// User declined the in-wallet approval prompt
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    /// RPC-level submission failure after approval
    #[error("Transaction submission failed: {0}")]
    TransactionSubmit(String),

    /// RPC failure while fetching a balance
    #[error("Balance query failed: {0}")]
    BalanceQuery(String),

    /// Configuration or initialization error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Contract interface descriptor could not be parsed or used
    #[error("Invalid contract ABI: {0}")]
    InvalidAbi(String),

    /// Durable client storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The gateway was torn down
    #[error("Gateway closed")]
    Closed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error object returned by an EIP-1193 `request` call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_REQUEST, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_REQUEST
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        GatewayError::Serialization(error.to_string())
    }
}

impl From<hex::FromHexError> for GatewayError {
    fn from(error: hex::FromHexError) -> Self {
        GatewayError::Serialization(format!("Hex error: {}", error))
    }
}
