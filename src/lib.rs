//! Lumanagi Gateway
//!
//! Wallet and blockchain gateway for the Lumanagi prediction market. Connects
//! a user's wallet, keeps chain clients and contract handles bound to the live
//! connection, submits signed transactions and reads native balances.

pub mod chain;
pub mod config;
pub mod connector;
pub mod error;
pub mod gateway;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{ChainClientFactory, ChainClientPair, ContractHandle, ContractRegistry, EndpointFactory};
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use connector::{Connector, Eip1193Connector, Eip1193Provider, WalletBrand, WalletSelector, WalletSession};
pub use error::{GatewayError, ProviderRpcError};
pub use gateway::{Gateway, SignerHandle, TransactionRequest};
pub use storage::{ConnectorStorage, FileStorage, MemoryStorage};
pub use store::{GatewaySnapshot, GatewayStore, RebuildOutcome, Selected};
pub use types::{ConnectorId, ConnectorKind, Transport, WalletConnection};
