pub mod eip1193;
pub mod selector;
pub mod session;

pub use eip1193::Eip1193Connector;
pub use selector::{WalletBrand, WalletSelector};
pub use session::WalletSession;

use std::fmt::Debug;

use async_trait::async_trait;
use ethers::types::Address;
use serde_json::Value;

use crate::error::{GatewayError, ProviderRpcError};

/// Request channel exposed by a wallet, shaped after EIP-1193.
///
/// Concrete wallets (browser injection, relay clients, Coinbase SDK) live
/// outside this crate and hand the gateway an implementation of this trait.
#[async_trait]
pub trait Eip1193Provider: Debug + Send + Sync {
    /// Sends a JSON-RPC request through the wallet.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// Account the wallet currently exposes, if any.
    fn selected_address(&self) -> Option<Address>;
}

/// Uniform capability over a wallet connection mechanism.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a connection and publishes it to the wallet session.
    async fn activate(&self) -> Result<(), GatewayError>;

    /// Tears the connection down. Calling it twice is harmless.
    fn deactivate(&self);
}

/// Events a wallet emits on its own initiative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnect,
}
