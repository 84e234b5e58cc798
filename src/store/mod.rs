mod selector;
pub use selector::Selected;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ethers::providers::{Http, JsonRpcClient, Ws};
use ethers::types::U256;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chain::{ChainClientFactory, ChainClientPair, ContractRegistry, ContractSet};
use crate::types::WalletConnection;

/// Point-in-time view of the gateway state.
pub struct GatewaySnapshot<H = Http, S = Ws>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    /// Most recent setup failure
    pub error_message: Option<String>,
    /// Native balance of the selected account
    pub balance: Option<U256>,
    /// Contract handles of the current chain client pair
    pub contracts: Option<Arc<ContractRegistry<H, S>>>,
}

impl<H, S> Default for GatewaySnapshot<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    fn default() -> Self {
        Self {
            error_message: None,
            balance: None,
            contracts: None,
        }
    }
}

impl<H, S> Clone for GatewaySnapshot<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    fn clone(&self) -> Self {
        Self {
            error_message: self.error_message.clone(),
            balance: self.balance,
            contracts: self.contracts.clone(),
        }
    }
}

impl<H, S> std::fmt::Debug for GatewaySnapshot<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySnapshot")
            .field("error_message", &self.error_message)
            .field("balance", &self.balance)
            .field("contracts", &self.contracts)
            .finish()
    }
}

pub type StoreSnapshot<F> =
    GatewaySnapshot<<F as ChainClientFactory>::Http, <F as ChainClientFactory>::Socket>;

pub type StoreRegistry<F> =
    ContractRegistry<<F as ChainClientFactory>::Http, <F as ChainClientFactory>::Socket>;

pub type StoreSelected<T, F> =
    Selected<T, <F as ChainClientFactory>::Http, <F as ChainClientFactory>::Socket>;

/// Result of one rebuild attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Handles of the new pair are now exposed
    Installed { generation: u64, pair_id: Uuid },
    /// A later rebuild or a disconnect overtook this one
    Superseded { generation: u64 },
    /// Construction failed; previous handles stay in place
    Failed { generation: u64 },
}

/// Reactive gateway state: error message, balance and contract handles.
///
/// Rebuilds are tagged with a generation taken when they start. Only the
/// latest generation may install its handles; anything older is discarded and
/// its pair closed, whatever order the constructions finish in.
pub struct GatewayStore<F: ChainClientFactory> {
    factory: F,
    contracts: ContractSet,
    chain_id: u64,
    generation: AtomicU64,
    connection_epoch: AtomicU64,
    closed: AtomicBool,
    state: watch::Sender<StoreSnapshot<F>>,
    pair: Mutex<Option<ChainClientPair<F::Http, F::Socket>>>,
}

impl<F: ChainClientFactory> GatewayStore<F> {
    pub fn new(factory: F, contracts: ContractSet, chain_id: u64) -> Self {
        let (state, _rx) = watch::channel(GatewaySnapshot::default());
        Self {
            factory,
            contracts,
            chain_id,
            generation: AtomicU64::new(0),
            connection_epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            state,
            pair: Mutex::new(None),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn snapshot(&self) -> StoreSnapshot<F> {
        self.state.borrow().clone()
    }

    pub fn contracts(&self) -> Option<Arc<StoreRegistry<F>>> {
        self.state.borrow().contracts.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.borrow().error_message.clone()
    }

    pub fn balance(&self) -> Option<U256> {
        self.state.borrow().balance
    }

    /// Watches one slice of the state.
    pub fn select<T, Sel>(&self, selector: Sel) -> StoreSelected<T, F>
    where
        T: Clone + PartialEq + Send + 'static,
        Sel: Fn(&StoreSnapshot<F>) -> T + Send + Sync + 'static,
    {
        Selected::new(self.state.subscribe(), selector)
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot<F>> {
        self.state.subscribe()
    }

    /// Replaces the current error message.
    pub fn set_error_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|state| state.error_message = Some(message));
    }

    pub fn clear_error_message(&self) {
        self.state
            .send_if_modified(|state| state.error_message.take().is_some());
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Counter bumped whenever the connected account may have changed.
    pub fn connection_epoch(&self) -> u64 {
        self.connection_epoch.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Records a balance fetched under `epoch`; dropped if the connection moved on.
    pub fn record_balance(&self, epoch: u64, balance: U256) -> bool {
        self.state.send_if_modified(|state| {
            if self.connection_epoch() != epoch || self.is_closed() {
                return false;
            }
            let changed = state.balance != Some(balance);
            state.balance = Some(balance);
            changed
        })
    }

    /// Builds a fresh chain client pair and exposes its handles if no later
    /// rebuild started meanwhile.
    pub async fn rebuild(&self) -> RebuildOutcome {
        let generation = self.next_generation();
        self.run_rebuild(generation).await
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.is_closed() && self.generation() == generation
    }

    async fn run_rebuild(&self, generation: u64) -> RebuildOutcome {
        debug!(generation, "Rebuilding chain clients");

        match self.factory.connect().await {
            Ok(pair) => self.install(generation, pair).await,
            Err(e) if self.is_current(generation) => {
                error!(generation, error = %e, "Chain client rebuild failed");
                self.set_error_message(format!(
                    "Failed to connect to the blockchain network: {}",
                    e
                ));
                RebuildOutcome::Failed { generation }
            }
            Err(e) => {
                debug!(generation, error = %e, "Ignoring failure of superseded rebuild");
                RebuildOutcome::Superseded { generation }
            }
        }
    }

    async fn install(
        &self,
        generation: u64,
        pair: ChainClientPair<F::Http, F::Socket>,
    ) -> RebuildOutcome {
        let mut current = self.pair.lock().await;

        if !self.is_current(generation) {
            drop(current);
            debug!(generation, pair = %pair.id(), "Discarding superseded chain clients");
            pair.close();
            return RebuildOutcome::Superseded { generation };
        }

        let pair_id = pair.id();
        let registry = Arc::new(ContractRegistry::bind(&pair, &self.contracts, generation));
        self.state
            .send_modify(|state| state.contracts = Some(registry));
        let previous = current.replace(pair);
        drop(current);

        if let Some(previous) = previous {
            previous.close();
        }

        info!(generation, pair = %pair_id, "Contract handles installed");
        RebuildOutcome::Installed {
            generation,
            pair_id,
        }
    }

    /// Drops every handle and the balance; in-flight rebuilds become stale.
    pub async fn invalidate(&self) {
        self.next_generation();
        self.connection_epoch.fetch_add(1, Ordering::SeqCst);

        let mut current = self.pair.lock().await;
        self.state.send_if_modified(|state| {
            let changed = state.contracts.is_some() || state.balance.is_some();
            state.contracts = None;
            state.balance = None;
            changed
        });
        let previous = current.take();
        drop(current);

        if let Some(previous) = previous {
            info!(pair = %previous.id(), "Contract handles invalidated");
            previous.close();
        }
    }

    fn reset_balance(&self) {
        self.connection_epoch.fetch_add(1, Ordering::SeqCst);
        self.state
            .send_if_modified(|state| state.balance.take().is_some());
    }

    fn spawn_rebuild(self: &Arc<Self>) {
        let generation = self.next_generation();
        let store = Arc::clone(self);
        tokio::spawn(async move {
            store.run_rebuild(generation).await;
        });
    }

    /// Reacts to a wallet connection transition.
    pub async fn apply_connection(
        self: &Arc<Self>,
        previous: Option<&WalletConnection>,
        next: Option<&WalletConnection>,
    ) {
        if self.is_closed() {
            return;
        }

        match (previous, next) {
            (None, None) => {}
            (Some(_), None) => self.invalidate().await,
            (None, Some(next)) => {
                self.warn_on_foreign_chain(next);
                self.reset_balance();
                self.spawn_rebuild();
            }
            (Some(previous), Some(next)) => {
                let provider_changed = !previous.same_provider(next);
                let chain_changed = previous.chain_id != next.chain_id;

                if provider_changed || chain_changed {
                    self.warn_on_foreign_chain(next);
                    self.reset_balance();
                    self.spawn_rebuild();
                } else if previous.selected_address != next.selected_address {
                    self.reset_balance();
                }
            }
        }
    }

    fn warn_on_foreign_chain(&self, connection: &WalletConnection) {
        if let Some(chain_id) = connection.chain_id {
            if chain_id != self.chain_id {
                warn!(
                    wallet_chain = chain_id,
                    configured_chain = self.chain_id,
                    "Wallet is on a different network than the gateway"
                );
            }
        }
    }

    /// Follows the wallet session until it closes.
    pub fn watch_connection(
        self: Arc<Self>,
        mut rx: watch::Receiver<Option<WalletConnection>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut previous: Option<WalletConnection> = None;
            loop {
                let next = rx.borrow_and_update().clone();
                self.apply_connection(previous.as_ref(), next.as_ref()).await;
                previous = next;

                if rx.changed().await.is_err() {
                    debug!("Wallet session closed, stopping connection watcher");
                    break;
                }
            }
        })
    }

    /// Stops accepting rebuilds and releases the chain clients.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.invalidate().await;
        info!("Gateway store shut down");
    }
}
