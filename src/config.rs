// Network endpoints, contract addresses and timeouts for the gateway

use std::time::Duration;

use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GatewayError;
use crate::types::{DEFAULT_RPC_TIMEOUT, DEFAULT_SOCKET_CONNECT_TIMEOUT};

/// Polygon Mumbai chain id
pub const POLYGON_MUMBAI_CHAIN_ID: u64 = 80001;

/// Chainlink MATIC/USD price feed proxy on Polygon Mumbai
pub const MUMBAI_MATIC_USD_AGGREGATOR: Address = H160([
    0xd0, 0xd5, 0xe3, 0xdb, 0x44, 0xde, 0x05, 0xe9, 0xf2, 0x94, 0xbb, 0x0a, 0x3b, 0xee, 0xaf,
    0x03, 0x0d, 0xe2, 0x4a, 0xda,
]);

/// Configuration parameters for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP JSON-RPC endpoint used for reads and balance queries
    pub http_url: String,
    /// WebSocket endpoint used for event subscriptions
    pub ws_url: String,
    /// Chain ID of the single configured network
    pub chain_id: u64,
    /// Address of the price-feed aggregator contract
    pub aggregator_address: Address,
    /// Address of the prediction contract
    pub prediction_address: Address,
    /// HTTP RPC request timeout
    pub rpc_timeout: Option<Duration>,
    /// Timeout for opening the WebSocket channel
    pub socket_connect_timeout: Option<Duration>,
    /// Timeout the wallet selector applies to connector activation (None waits forever)
    pub activation_timeout: Option<Duration>,
}

/// Builder pattern for GatewayConfig
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Creates a new configuration builder
    pub fn new(
        http_url: String,
        ws_url: String,
        chain_id: u64,
        aggregator_address: Address,
        prediction_address: Address,
    ) -> Self {
        Self {
            config: GatewayConfig {
                http_url,
                ws_url,
                chain_id,
                aggregator_address,
                prediction_address,
                rpc_timeout: None,
                socket_connect_timeout: None,
                activation_timeout: None,
            },
        }
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.config.rpc_timeout = Some(timeout);
        self
    }

    pub fn socket_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket_connect_timeout = Some(timeout);
        self
    }

    pub fn activation_timeout(mut self, timeout: Duration) -> Self {
        self.config.activation_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

impl GatewayConfig {
    pub fn polygon_mumbai(http_url: String, ws_url: String, prediction_address: Address) -> Self {
        Self {
            http_url,
            ws_url,
            chain_id: POLYGON_MUMBAI_CHAIN_ID,
            aggregator_address: MUMBAI_MATIC_USD_AGGREGATOR,
            prediction_address,
            rpc_timeout: Some(Duration::from_secs(15)),
            socket_connect_timeout: Some(Duration::from_secs(10)),
            activation_timeout: None,
        }
    }

    pub fn development(aggregator_address: Address, prediction_address: Address) -> Self {
        Self {
            http_url: "http://127.0.0.1:8545".to_string(),
            ws_url: "ws://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            aggregator_address,
            prediction_address,
            rpc_timeout: Some(Duration::from_secs(5)),
            socket_connect_timeout: Some(Duration::from_secs(5)),
            activation_timeout: Some(Duration::from_secs(60)),
        }
    }

    /// Parses a configuration from JSON and validates it
    pub fn from_json(raw: &str) -> Result<Self, GatewayError> {
        let config: GatewayConfig = serde_json::from_str(raw)
            .map_err(|e| GatewayError::Configuration(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout.unwrap_or(DEFAULT_RPC_TIMEOUT)
    }

    pub fn socket_connect_timeout(&self) -> Duration {
        self.socket_connect_timeout
            .unwrap_or(DEFAULT_SOCKET_CONNECT_TIMEOUT)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !self.http_url.starts_with("http://") && !self.http_url.starts_with("https://") {
            return Err(GatewayError::Configuration(
                "HTTP URL must start with http:// or https://".to_string(),
            ));
        }

        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(GatewayError::Configuration(
                "WebSocket URL must start with ws:// or wss://".to_string(),
            ));
        }

        if self.chain_id == 0 {
            return Err(GatewayError::Configuration(
                "Chain ID cannot be zero".to_string(),
            ));
        }

        if self.aggregator_address == Address::zero() {
            return Err(GatewayError::Configuration(
                "Aggregator address cannot be zero address".to_string(),
            ));
        }

        if self.prediction_address == Address::zero() {
            return Err(GatewayError::Configuration(
                "Prediction address cannot be zero address".to_string(),
            ));
        }

        if self.aggregator_address == self.prediction_address {
            warn!(
                "Aggregator and prediction contracts share address {:?}",
                self.aggregator_address
            );
        }

        Ok(())
    }
}
