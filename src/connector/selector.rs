use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::connector::Connector;
use crate::error::GatewayError;
use crate::storage::ConnectorStorage;
use crate::types::{ConnectorId, CONNECTOR_STORAGE_KEY};

/// Wallet brands a user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletBrand {
    MetaMask,
    WalletConnect,
    Coinbase,
    /// Listed for users but has no connector yet; activating it does nothing.
    Phantom,
}

impl WalletBrand {
    pub const ALL: [WalletBrand; 4] = [
        WalletBrand::MetaMask,
        WalletBrand::Phantom,
        WalletBrand::Coinbase,
        WalletBrand::WalletConnect,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WalletBrand::MetaMask => "MetaMask",
            WalletBrand::WalletConnect => "WalletConnect",
            WalletBrand::Coinbase => "Coinbase",
            WalletBrand::Phantom => "Phantom",
        }
    }

    /// Identifier persisted after activation. Coinbase Wallet reconnects
    /// through the injected provider, so it shares the injected id.
    pub fn storage_id(&self) -> Option<ConnectorId> {
        match self {
            WalletBrand::MetaMask | WalletBrand::Coinbase => Some(ConnectorId::Injected),
            WalletBrand::WalletConnect => Some(ConnectorId::WalletConnect),
            WalletBrand::Phantom => None,
        }
    }

    /// Brand whose connector re-activates a persisted id.
    pub fn for_storage_id(id: ConnectorId) -> WalletBrand {
        match id {
            ConnectorId::Injected => WalletBrand::MetaMask,
            ConnectorId::WalletConnect => WalletBrand::WalletConnect,
        }
    }
}

impl fmt::Display for WalletBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WalletBrand {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WalletBrand::ALL
            .into_iter()
            .find(|brand| brand.label() == s)
            .ok_or_else(|| GatewayError::Connector(format!("Unknown wallet: {}", s)))
    }
}

/// Maps wallet brands to connectors and remembers the last one used.
pub struct WalletSelector {
    connectors: HashMap<WalletBrand, Arc<dyn Connector>>,
    storage: Arc<dyn ConnectorStorage>,
    activation_timeout: Option<Duration>,
    selected: RwLock<Option<WalletBrand>>,
}

impl WalletSelector {
    pub fn new(storage: Arc<dyn ConnectorStorage>) -> Self {
        Self {
            connectors: HashMap::new(),
            storage,
            activation_timeout: None,
            selected: RwLock::new(None),
        }
    }

    pub fn with_connector(mut self, brand: WalletBrand, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(brand, connector);
        self
    }

    /// Bounds how long a wallet handshake may wait on the user.
    pub fn with_activation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.activation_timeout = timeout;
        self
    }

    pub fn selected_wallet(&self) -> Option<WalletBrand> {
        self.selected.read().ok().and_then(|selected| *selected)
    }

    /// Activates the connector for `brand` and persists its id.
    ///
    /// Returns the connector id, or `None` for brands without a connector. A
    /// storage failure after the wallet connected is logged, not returned.
    #[instrument(skip(self), fields(wallet = %brand))]
    pub async fn activate(&self, brand: WalletBrand) -> Result<Option<ConnectorId>, GatewayError> {
        let Some(storage_id) = brand.storage_id() else {
            info!("No connector available for this wallet, ignoring selection");
            return Ok(None);
        };

        let connector = self.connectors.get(&brand).ok_or_else(|| {
            GatewayError::Connector(format!("No connector registered for {}", brand))
        })?;

        self.run_activation(connector.as_ref()).await?;

        if let Ok(mut selected) = self.selected.write() {
            *selected = Some(brand);
        }
        if let Err(e) = self.storage.set(CONNECTOR_STORAGE_KEY, storage_id.as_str()) {
            warn!(error = %e, "Wallet connected but its connector could not be persisted");
        }

        info!(connector_id = %storage_id, "Wallet connected");
        Ok(Some(storage_id))
    }

    /// Activates by display label; unknown labels are ignored.
    pub async fn activate_label(&self, label: &str) -> Result<Option<ConnectorId>, GatewayError> {
        match label.parse::<WalletBrand>() {
            Ok(brand) => self.activate(brand).await,
            Err(_) => {
                warn!(label, "Ignoring unknown wallet label");
                Ok(None)
            }
        }
    }

    /// Re-activates the connector persisted by an earlier session.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<WalletBrand>, GatewayError> {
        let Some(raw) = self.storage.get(CONNECTOR_STORAGE_KEY)? else {
            debug!("No persisted connector");
            return Ok(None);
        };

        let id = match raw.parse::<ConnectorId>() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Dropping unreadable persisted connector");
                self.storage.remove(CONNECTOR_STORAGE_KEY)?;
                return Ok(None);
            }
        };

        let brand = WalletBrand::for_storage_id(id);
        self.activate(brand).await?;
        Ok(Some(brand))
    }

    /// Deactivates the selected connector and forgets it.
    pub fn disconnect(&self) -> Result<(), GatewayError> {
        let brand = self
            .selected
            .write()
            .ok()
            .and_then(|mut selected| selected.take());

        if let Some(connector) = brand.and_then(|brand| self.connectors.get(&brand)) {
            connector.deactivate();
        }
        self.storage.remove(CONNECTOR_STORAGE_KEY)
    }

    async fn run_activation(&self, connector: &dyn Connector) -> Result<(), GatewayError> {
        match self.activation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connector.activate())
                .await
                .map_err(|_| {
                    GatewayError::Connector(format!(
                        "Wallet handshake timed out after {:?}",
                        timeout
                    ))
                })?,
            None => connector.activate().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Eip1193Connector, Eip1193Provider, WalletSession};
    use crate::storage::MemoryStorage;
    use crate::testing::MockWallet;
    use crate::types::ConnectorKind;
    use async_trait::async_trait;
    use ethers::types::Address;

    struct StalledConnector;

    #[async_trait]
    impl Connector for StalledConnector {
        async fn activate(&self) -> Result<(), GatewayError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        fn deactivate(&self) {}
    }

    struct ReadOnlyStorage;

    impl ConnectorStorage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, GatewayError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Storage("read-only".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn selector() -> (WalletSelector, Arc<MemoryStorage>, Arc<WalletSession>) {
        let session = Arc::new(WalletSession::new());
        let storage = Arc::new(MemoryStorage::new());
        let wallet = |n| {
            Some(Arc::new(MockWallet::new(Address::from_low_u64_be(n), 80001))
                as Arc<dyn Eip1193Provider>)
        };

        let selector = WalletSelector::new(storage.clone())
            .with_connector(
                WalletBrand::MetaMask,
                Arc::new(Eip1193Connector::new(ConnectorKind::Injected, wallet(1), session.clone())),
            )
            .with_connector(
                WalletBrand::WalletConnect,
                Arc::new(Eip1193Connector::new(
                    ConnectorKind::WalletConnect,
                    wallet(2),
                    session.clone(),
                )),
            )
            .with_connector(
                WalletBrand::Coinbase,
                Arc::new(Eip1193Connector::new(
                    ConnectorKind::CoinbaseWallet,
                    wallet(3),
                    session.clone(),
                )),
            );
        (selector, storage, session)
    }

    #[test]
    fn test_brand_labels_round_trip() {
        for brand in WalletBrand::ALL {
            assert_eq!(brand.label().parse::<WalletBrand>().unwrap(), brand);
        }
        assert!("Ledger".parse::<WalletBrand>().is_err());
    }

    #[tokio::test]
    async fn test_activation_persists_connector_id() {
        let (selector, storage, session) = selector();

        let id = selector.activate(WalletBrand::MetaMask).await.unwrap();
        assert_eq!(id, Some(ConnectorId::Injected));
        assert_eq!(
            storage.get(CONNECTOR_STORAGE_KEY).unwrap().as_deref(),
            Some("injected")
        );

        selector.activate(WalletBrand::WalletConnect).await.unwrap();
        assert_eq!(
            storage.get(CONNECTOR_STORAGE_KEY).unwrap().as_deref(),
            Some("wallet_connect")
        );
        assert_eq!(selector.selected_wallet(), Some(WalletBrand::WalletConnect));
        assert_eq!(
            session.current().unwrap().connector,
            ConnectorKind::WalletConnect
        );
    }

    #[tokio::test]
    async fn test_phantom_is_a_no_op() {
        let (selector, storage, session) = selector();

        let id = selector.activate_label("Phantom").await.unwrap();
        assert!(id.is_none());
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
        assert!(session.current().is_none());
        assert!(selector.selected_wallet().is_none());
    }

    #[tokio::test]
    async fn test_coinbase_persists_injected_id() {
        let (selector, storage, _) = selector();
        selector.activate(WalletBrand::Coinbase).await.unwrap();
        assert_eq!(
            storage.get(CONNECTOR_STORAGE_KEY).unwrap().as_deref(),
            Some("injected")
        );
    }

    #[tokio::test]
    async fn test_failed_activation_writes_nothing() {
        let session = Arc::new(WalletSession::new());
        let storage = Arc::new(MemoryStorage::new());
        let selector = WalletSelector::new(storage.clone()).with_connector(
            WalletBrand::MetaMask,
            Arc::new(Eip1193Connector::new(ConnectorKind::Injected, None, session)),
        );

        let err = selector.activate(WalletBrand::MetaMask).await.unwrap_err();
        assert!(matches!(err, GatewayError::Connector(_)));
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_connected_wallet() {
        let session = Arc::new(WalletSession::new());
        let wallet = Arc::new(MockWallet::new(Address::from_low_u64_be(1), 80001));
        let selector = WalletSelector::new(Arc::new(ReadOnlyStorage)).with_connector(
            WalletBrand::MetaMask,
            Arc::new(Eip1193Connector::new(
                ConnectorKind::Injected,
                Some(wallet as Arc<dyn Eip1193Provider>),
                session.clone(),
            )),
        );

        let id = selector.activate(WalletBrand::MetaMask).await.unwrap();
        assert_eq!(id, Some(ConnectorId::Injected));
        assert_eq!(selector.selected_wallet(), Some(WalletBrand::MetaMask));
        assert!(session.current().is_some());
    }

    #[tokio::test]
    async fn test_activation_timeout() {
        let storage = Arc::new(MemoryStorage::new());
        let selector = WalletSelector::new(storage.clone())
            .with_connector(WalletBrand::MetaMask, Arc::new(StalledConnector))
            .with_activation_timeout(Some(Duration::from_millis(20)));

        let err = selector.activate(WalletBrand::MetaMask).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_reactivates_persisted_connector() {
        let (selector, storage, session) = selector();
        storage.set(CONNECTOR_STORAGE_KEY, "wallet_connect").unwrap();

        let brand = selector.restore().await.unwrap();
        assert_eq!(brand, Some(WalletBrand::WalletConnect));
        assert_eq!(
            session.current().unwrap().connector,
            ConnectorKind::WalletConnect
        );
    }

    #[tokio::test]
    async fn test_restore_drops_unknown_id() {
        let (selector, storage, session) = selector();
        storage.set(CONNECTOR_STORAGE_KEY, "phantom").unwrap();

        assert!(selector.restore().await.unwrap().is_none());
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_clears_session_and_storage() {
        let (selector, storage, session) = selector();
        selector.activate(WalletBrand::MetaMask).await.unwrap();

        selector.disconnect().unwrap();
        assert!(session.current().is_none());
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
        assert!(selector.selected_wallet().is_none());
    }
}
