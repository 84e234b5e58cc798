//! Top-level handle tying the wallet session to the chain client store.

pub mod balance;
pub mod signer;
pub mod transaction;

pub use signer::{resolve_signer, SignerHandle};
pub use transaction::{SubmittedCallback, TransactionEnvelope, TransactionRequest};

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chain::{ChainClientFactory, ContractSet, EndpointFactory};
use crate::config::GatewayConfig;
use crate::connector::{Eip1193Provider, WalletBrand, WalletSelector, WalletSession};
use crate::error::GatewayError;
use crate::storage::ConnectorStorage;
use crate::store::GatewayStore;
use crate::types::ConnectorId;

/// Wallet and blockchain gateway.
///
/// Owns the state store and keeps it in step with the wallet session once
/// [`Gateway::start`] has been called.
pub struct Gateway<F: ChainClientFactory = EndpointFactory> {
    config: GatewayConfig,
    store: Arc<GatewayStore<F>>,
    session: Arc<WalletSession>,
    injected: Option<Arc<dyn Eip1193Provider>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway<EndpointFactory> {
    /// Gateway talking to the endpoints named in `config`.
    pub fn connect_endpoints(
        config: GatewayConfig,
        session: Arc<WalletSession>,
        injected: Option<Arc<dyn Eip1193Provider>>,
    ) -> Result<Self, GatewayError> {
        let factory = EndpointFactory::new(config.clone());
        Self::new(config, factory, session, injected)
    }
}

impl<F: ChainClientFactory> Gateway<F> {
    pub fn new(
        config: GatewayConfig,
        factory: F,
        session: Arc<WalletSession>,
        injected: Option<Arc<dyn Eip1193Provider>>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        let contracts = ContractSet::load(&config)?;
        let store = Arc::new(GatewayStore::new(factory, contracts, config.chain_id));

        info!(
            chain_id = config.chain_id,
            injected_wallet = injected.is_some(),
            "Gateway created"
        );

        Ok(Self {
            config,
            store,
            session,
            injected,
            watcher: Mutex::new(None),
        })
    }

    /// Starts following the wallet session. Calling it again is a no-op.
    pub fn start(&self) {
        let Ok(mut watcher) = self.watcher.lock() else {
            warn!("Connection watcher lock poisoned, not starting");
            return;
        };
        if watcher.is_some() {
            debug!("Connection watcher already running");
            return;
        }
        let handle = Arc::clone(&self.store).watch_connection(self.session.subscribe());
        *watcher = Some(handle);
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<GatewayStore<F>> {
        &self.store
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Whether any wallet mechanism is reachable.
    pub fn has_wallet(&self) -> bool {
        self.injected.is_some() || self.session.current().is_some()
    }

    /// Selector persisting to `storage`, bounded by the configured activation timeout.
    pub fn wallet_selector(&self, storage: Arc<dyn ConnectorStorage>) -> WalletSelector {
        WalletSelector::new(storage).with_activation_timeout(self.config.activation_timeout)
    }

    /// Activates `brand`, surfacing a failure as the store's error message.
    pub async fn connect_wallet(
        &self,
        selector: &WalletSelector,
        brand: WalletBrand,
    ) -> Option<ConnectorId> {
        match selector.activate(brand).await {
            Ok(id) => id,
            Err(e) => {
                warn!(wallet = %brand, error = %e, "Wallet activation failed");
                self.store.set_error_message(e.to_string());
                None
            }
        }
    }

    /// Reconnects the wallet used in an earlier session, if any.
    pub async fn restore_wallet(&self, selector: &WalletSelector) -> Option<WalletBrand> {
        match selector.restore().await {
            Ok(brand) => brand,
            Err(e) => {
                warn!(error = %e, "Could not restore previous wallet");
                self.store.set_error_message(e.to_string());
                None
            }
        }
    }

    /// Stops the watcher and releases the chain clients.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().ok().and_then(|mut w| w.take()) {
            handle.abort();
        }
        self.store.shutdown().await;
    }
}
