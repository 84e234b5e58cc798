use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, U64};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::connector::{Connector, Eip1193Provider, WalletEvent, WalletSession};
use crate::error::{GatewayError, ProviderRpcError};
use crate::types::{ConnectorKind, WalletConnection};

/// Connector for any wallet that speaks EIP-1193 requests.
///
/// Injected extensions, relay clients and the Coinbase SDK all end up exposing
/// this request shape, so one implementation serves every supported brand;
/// `kind` records which mechanism it stands for.
#[derive(Debug)]
pub struct Eip1193Connector {
    kind: ConnectorKind,
    provider: Option<Arc<dyn Eip1193Provider>>,
    session: Arc<WalletSession>,
}

impl Eip1193Connector {
    /// `provider` is `None` when the wallet is not installed.
    pub fn new(
        kind: ConnectorKind,
        provider: Option<Arc<dyn Eip1193Provider>>,
        session: Arc<WalletSession>,
    ) -> Self {
        Self {
            kind,
            provider,
            session,
        }
    }

    pub fn kind(&self) -> ConnectorKind {
        self.kind
    }

    /// Applies an event emitted by the wallet to the published connection.
    pub fn handle_event(&self, event: WalletEvent) {
        let Some(provider) = &self.provider else {
            return;
        };

        match event {
            WalletEvent::AccountsChanged(accounts) => {
                if accounts.is_empty() {
                    info!(connector = %self.kind, "Wallet exposed no accounts, disconnecting");
                    self.session.clear_if_owned(provider);
                    return;
                }
                let selected = accounts.first().copied();
                self.session.update_if_owned(provider, |connection| {
                    connection.selected_address = selected;
                });
            }
            WalletEvent::ChainChanged(chain_id) => {
                debug!(connector = %self.kind, chain_id, "Wallet switched chain");
                self.session.update_if_owned(provider, |connection| {
                    connection.chain_id = Some(chain_id);
                });
            }
            WalletEvent::Disconnect => {
                info!(connector = %self.kind, "Wallet disconnected");
                self.session.clear_if_owned(provider);
            }
        }
    }

    async fn request_accounts(
        &self,
        provider: &Arc<dyn Eip1193Provider>,
    ) -> Result<Vec<Address>, GatewayError> {
        let response = provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(|e| self.handshake_error(e))?;
        let accounts: Vec<Address> = serde_json::from_value(response)
            .map_err(|e| GatewayError::Connector(format!("Malformed accounts response: {}", e)))?;
        Ok(accounts)
    }

    async fn chain_id(&self, provider: &Arc<dyn Eip1193Provider>) -> Result<u64, GatewayError> {
        let response = provider
            .request("eth_chainId", Value::Array(Vec::new()))
            .await
            .map_err(|e| self.handshake_error(e))?;
        let chain_id: U64 = serde_json::from_value(response)
            .map_err(|e| GatewayError::Connector(format!("Malformed chain id: {}", e)))?;
        Ok(chain_id.as_u64())
    }

    fn handshake_error(&self, error: ProviderRpcError) -> GatewayError {
        if error.is_user_rejection() {
            GatewayError::Connector(format!("{} connection rejected by user", self.kind))
        } else {
            GatewayError::Connector(format!("{} handshake failed: {}", self.kind, error))
        }
    }
}

#[async_trait]
impl Connector for Eip1193Connector {
    #[instrument(skip(self), fields(connector = %self.kind))]
    async fn activate(&self) -> Result<(), GatewayError> {
        let provider = self.provider.clone().ok_or_else(|| {
            GatewayError::Connector(format!("{} wallet is not installed", self.kind))
        })?;

        let accounts = self.request_accounts(&provider).await?;
        let chain_id = self.chain_id(&provider).await?;

        if accounts.is_empty() {
            warn!("Wallet connected without exposing an account");
        }

        self.session.publish(WalletConnection {
            provider,
            chain_id: Some(chain_id),
            selected_address: accounts.first().copied(),
            connector: self.kind,
        });

        info!(chain_id, accounts = accounts.len(), "Wallet activated");
        Ok(())
    }

    fn deactivate(&self) {
        if let Some(provider) = &self.provider {
            if self.session.clear_if_owned(provider) {
                info!(connector = %self.kind, "Wallet deactivated");
            }
        }
    }
}
