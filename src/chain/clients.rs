use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Provider, Ws};
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::types::DEFAULT_POLL_INTERVAL;

/// HTTP request/response channel plus WebSocket subscription channel to one network.
///
/// Immutable once built. The pair is replaced as a whole, never patched.
pub struct ChainClientPair<H = Http, S = Ws>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    id: Uuid,
    http: Arc<Provider<H>>,
    socket: Arc<Provider<S>>,
    created_at: Instant,
}

impl<H, S> ChainClientPair<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    pub fn new(http: Provider<H>, socket: Provider<S>) -> Self {
        Self {
            id: Uuid::new_v4(),
            http: Arc::new(http),
            socket: Arc::new(socket),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn http(&self) -> Arc<Provider<H>> {
        Arc::clone(&self.http)
    }

    pub fn socket(&self) -> Arc<Provider<S>> {
        Arc::clone(&self.socket)
    }

    /// Releases the pair. The socket connection shuts down once the last
    /// reference to it is gone, so callers drop every handle bound to this
    /// pair before closing it.
    pub fn close(self) {
        let id = self.id;
        let age = self.created_at.elapsed();
        drop(self.http);

        match Arc::try_unwrap(self.socket) {
            Ok(socket) => {
                drop(socket);
                debug!(pair = %id, ?age, "Socket channel closed");
            }
            Err(shared) => {
                warn!(
                    pair = %id,
                    outstanding = Arc::strong_count(&shared) - 1,
                    "Socket channel still referenced, it closes when the last handle drops"
                );
            }
        }
    }
}

impl<H, S> std::fmt::Debug for ChainClientPair<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClientPair")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Builds chain client pairs. The store calls it on every rebuild.
#[async_trait]
pub trait ChainClientFactory: Send + Sync + 'static {
    type Http: JsonRpcClient + 'static;
    type Socket: JsonRpcClient + 'static;

    async fn connect(&self) -> Result<ChainClientPair<Self::Http, Self::Socket>, GatewayError>;
}

/// Factory bound to the configured HTTP and WebSocket endpoints.
#[derive(Debug, Clone)]
pub struct EndpointFactory {
    config: GatewayConfig,
}

impl EndpointFactory {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn http_provider(&self) -> Result<Provider<Http>, GatewayError> {
        let url = Url::parse(&self.config.http_url)
            .map_err(|e| GatewayError::ChainClient(format!("Invalid RPC URL: {}", e)))?;

        let client = Client::builder()
            .timeout(self.config.rpc_timeout())
            .build()
            .map_err(|e| {
                GatewayError::ChainClient(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Provider::new(Http::new_with_client(url, client)).interval(DEFAULT_POLL_INTERVAL))
    }

    async fn socket_provider(&self) -> Result<Provider<Ws>, GatewayError> {
        let timeout = self.config.socket_connect_timeout();
        let ws = tokio::time::timeout(timeout, Ws::connect(self.config.ws_url.as_str()))
            .await
            .map_err(|_| {
                GatewayError::ChainClient(format!(
                    "Socket connection to {} timed out after {:?}",
                    self.config.ws_url, timeout
                ))
            })?
            .map_err(|e| {
                GatewayError::ChainClient(format!(
                    "Failed to connect to {}: {}",
                    self.config.ws_url, e
                ))
            })?;

        Ok(Provider::new(ws))
    }
}

#[async_trait]
impl ChainClientFactory for EndpointFactory {
    type Http = Http;
    type Socket = Ws;

    #[instrument(skip(self), fields(chain_id = self.config.chain_id))]
    async fn connect(&self) -> Result<ChainClientPair<Http, Ws>, GatewayError> {
        let http = self.http_provider()?;
        let socket = self.socket_provider().await?;
        let pair = ChainClientPair::new(http, socket);
        info!(pair = %pair.id(), "Chain clients connected");
        Ok(pair)
    }
}
