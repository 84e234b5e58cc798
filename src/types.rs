use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::connector::Eip1193Provider;
use crate::error::GatewayError;

/// Default timeout for HTTP RPC requests
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for opening the WebSocket channel
pub const DEFAULT_SOCKET_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Polling interval handed to the HTTP provider for filters and pending transactions
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Durable storage key holding the last activated connector
pub const CONNECTOR_STORAGE_KEY: &str = "connectorId";

/// Identifier persisted to durable storage after a successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorId {
    Injected,
    WalletConnect,
}

impl ConnectorId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorId::Injected => "injected",
            ConnectorId::WalletConnect => "wallet_connect",
        }
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "injected" => Ok(ConnectorId::Injected),
            "wallet_connect" => Ok(ConnectorId::WalletConnect),
            other => Err(GatewayError::Storage(format!(
                "Unknown connector id: {}",
                other
            ))),
        }
    }
}

/// Mechanism that produced a wallet connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// Browser-injected provider (MetaMask and friends)
    Injected,
    /// Relay-based connection
    WalletConnect,
    /// Coinbase Wallet extension or SDK
    CoinbaseWallet,
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorKind::Injected => "injected",
            ConnectorKind::WalletConnect => "walletconnect",
            ConnectorKind::CoinbaseWallet => "coinbase",
        };
        f.write_str(name)
    }
}

/// Channel a contract handle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    Http,
    Socket,
}

/// Live wallet connection published by a connector.
#[derive(Debug, Clone)]
pub struct WalletConnection {
    /// Request channel of the connected wallet
    pub provider: Arc<dyn Eip1193Provider>,
    /// Chain currently selected in the wallet
    pub chain_id: Option<u64>,
    /// Account currently selected in the wallet
    pub selected_address: Option<Address>,
    /// Mechanism that established the connection
    pub connector: ConnectorKind,
}

impl WalletConnection {
    /// Whether both connections are backed by the same provider instance.
    pub fn same_provider(&self, other: &WalletConnection) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_id_strings() {
        assert_eq!(ConnectorId::Injected.as_str(), "injected");
        assert_eq!(ConnectorId::WalletConnect.as_str(), "wallet_connect");
        assert_eq!("wallet_connect".parse::<ConnectorId>().unwrap(), ConnectorId::WalletConnect);
        assert!("phantom".parse::<ConnectorId>().is_err());
    }

    #[test]
    fn test_connector_id_serde_matches_storage_form() {
        let json = serde_json::to_string(&ConnectorId::WalletConnect).unwrap();
        assert_eq!(json, "\"wallet_connect\"");
    }
}
