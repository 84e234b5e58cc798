use std::sync::Arc;

use ethers::types::{Address, TxHash};
use serde_json::{json, Value};
use tracing::debug;

use crate::chain::ChainClientFactory;
use crate::connector::Eip1193Provider;
use crate::error::GatewayError;
use crate::gateway::{Gateway, TransactionEnvelope};
use crate::types::WalletConnection;

/// Wallet channel able to sign and send transactions.
#[derive(Debug, Clone)]
pub struct SignerHandle {
    provider: Arc<dyn Eip1193Provider>,
}

impl SignerHandle {
    pub fn new(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn Eip1193Provider> {
        &self.provider
    }

    /// First account the wallet exposes.
    pub async fn address(&self) -> Result<Address, GatewayError> {
        let accounts = self
            .provider
            .request("eth_accounts", json!([]))
            .await
            .map_err(|e| {
                GatewayError::Connector(format!("Could not read wallet accounts: {}", e))
            })?;

        let accounts: Vec<Address> = serde_json::from_value(accounts)?;
        accounts
            .first()
            .copied()
            .ok_or_else(|| GatewayError::NoWallet("Wallet exposes no account".to_string()))
    }

    /// Hands `envelope` to the wallet for signing and broadcast.
    pub(crate) async fn send_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<TxHash, GatewayError> {
        let response = self
            .provider
            .request("eth_sendTransaction", json!([envelope]))
            .await
            .map_err(|e| {
                if e.is_user_rejection() {
                    GatewayError::TransactionRejected(e.message)
                } else {
                    GatewayError::TransactionSubmit(e.to_string())
                }
            })?;

        match response {
            Value::Null => Err(GatewayError::TransactionSubmit(
                "Wallet returned no transaction hash".to_string(),
            )),
            other => serde_json::from_value(other).map_err(|e| {
                GatewayError::TransactionSubmit(format!("Malformed transaction hash: {}", e))
            }),
        }
    }
}

/// Picks the signer for the current connection state.
///
/// The live connection wins; the injected wallet is the fallback.
pub fn resolve_signer(
    connection: Option<&WalletConnection>,
    injected: Option<&Arc<dyn Eip1193Provider>>,
) -> Result<SignerHandle, GatewayError> {
    if let Some(connection) = connection {
        debug!(connector = %connection.connector, "Signing through connected wallet");
        return Ok(SignerHandle::new(Arc::clone(&connection.provider)));
    }

    injected
        .map(|provider| SignerHandle::new(Arc::clone(provider)))
        .ok_or_else(|| GatewayError::NoWallet("Install MetaMask".to_string()))
}

impl<F: ChainClientFactory> Gateway<F> {
    /// Signer for the connection as it stands right now.
    pub fn signer(&self) -> Result<SignerHandle, GatewayError> {
        resolve_signer(self.session.current().as_ref(), self.injected.as_ref())
    }
}
