use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use tracing::{debug, instrument};

use crate::chain::ChainClientFactory;
use crate::error::GatewayError;
use crate::gateway::Gateway;

impl<F: ChainClientFactory> Gateway<F> {
    /// Account the wallet currently has selected.
    ///
    /// A live connection is authoritative, even when it has no account. The
    /// injected wallet is only consulted when nothing is connected.
    pub fn selected_address(&self) -> Option<Address> {
        match self.session.current() {
            Some(connection) => connection.selected_address,
            None => self
                .injected
                .as_ref()
                .and_then(|provider| provider.selected_address()),
        }
    }

    /// Native balance of the selected account, in wei.
    ///
    /// Zero when no account is selected. The result is recorded in the store
    /// unless the wallet connection changed while the query was in flight.
    #[instrument(skip(self))]
    pub async fn get_balance(&self) -> Result<U256, GatewayError> {
        if !self.has_wallet() {
            return Err(GatewayError::NoWallet("Install MetaMask".to_string()));
        }

        let epoch = self.store.connection_epoch();
        let Some(address) = self.selected_address() else {
            debug!("No account selected, reporting zero balance");
            self.store.record_balance(epoch, U256::zero());
            return Ok(U256::zero());
        };

        let registry = self.store.contracts().ok_or_else(|| {
            GatewayError::BalanceQuery("Chain clients are not connected".to_string())
        })?;

        let balance = registry
            .http()
            .get_balance(address, None)
            .await
            .map_err(|e| GatewayError::BalanceQuery(e.to_string()))?;

        if !self.store.record_balance(epoch, balance) {
            debug!(?address, "Connection changed during balance query, not recording");
        }
        Ok(balance)
    }
}
