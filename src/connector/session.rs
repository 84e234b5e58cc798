use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::connector::Eip1193Provider;
use crate::types::WalletConnection;

/// Single source of truth for the active wallet connection.
///
/// Connectors write into it; the store and the transaction gateway only read.
#[derive(Debug)]
pub struct WalletSession {
    tx: watch::Sender<Option<WalletConnection>>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<WalletConnection>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<WalletConnection> {
        self.tx.borrow().clone()
    }

    pub(crate) fn publish(&self, connection: WalletConnection) {
        debug!(
            connector = %connection.connector,
            chain_id = ?connection.chain_id,
            "Publishing wallet connection"
        );
        self.tx.send_replace(Some(connection));
    }

    /// Applies `update` to the connection if `owner` produced it.
    pub(crate) fn update_if_owned<F>(&self, owner: &Arc<dyn Eip1193Provider>, update: F) -> bool
    where
        F: FnOnce(&mut WalletConnection),
    {
        self.tx.send_if_modified(|current| match current.as_mut() {
            Some(connection) if Arc::ptr_eq(&connection.provider, owner) => {
                update(connection);
                true
            }
            _ => false,
        })
    }

    /// Clears the connection if `owner` produced it.
    pub(crate) fn clear_if_owned(&self, owner: &Arc<dyn Eip1193Provider>) -> bool {
        self.tx.send_if_modified(|current| {
            let owned = matches!(current, Some(connection) if Arc::ptr_eq(&connection.provider, owner));
            if owned {
                *current = None;
            }
            owned
        })
    }
}
