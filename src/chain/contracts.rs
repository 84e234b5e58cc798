use std::fmt;
use std::sync::Arc;

use ethers::abi::{Abi, Tokenize};
use ethers::contract::Contract;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider, Ws};
use ethers::types::{Address, Bytes};
use ethers::utils::to_checksum;
use tracing::debug;
use uuid::Uuid;

use crate::chain::clients::ChainClientPair;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::types::Transport;

const AGGREGATOR_ABI: &str = include_str!("abi/EACAggregatorProxy.json");
const PREDICTION_ABI: &str = include_str!("abi/LumanagiPredictionV1.json");

/// Address and interface of one fixed contract.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub name: &'static str,
    pub address: Address,
    pub abi: Abi,
}

/// The two contracts the gateway binds, parsed once at start-up.
#[derive(Debug, Clone)]
pub struct ContractSet {
    pub aggregator: ContractDescriptor,
    pub prediction: ContractDescriptor,
}

impl ContractSet {
    /// Loads the bundled interface descriptors for the configured addresses.
    pub fn load(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::from_descriptors(
            config.aggregator_address,
            AGGREGATOR_ABI,
            config.prediction_address,
            PREDICTION_ABI,
        )
    }

    pub fn from_descriptors(
        aggregator_address: Address,
        aggregator_abi: &str,
        prediction_address: Address,
        prediction_abi: &str,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            aggregator: ContractDescriptor {
                name: "EACAggregatorProxy",
                address: aggregator_address,
                abi: parse_abi("EACAggregatorProxy", aggregator_abi)?,
            },
            prediction: ContractDescriptor {
                name: "LumanagiPredictionV1",
                address: prediction_address,
                abi: parse_abi("LumanagiPredictionV1", prediction_abi)?,
            },
        })
    }
}

fn parse_abi(name: &str, raw: &str) -> Result<Abi, GatewayError> {
    serde_json::from_str(raw).map_err(|e| GatewayError::InvalidAbi(format!("{}: {}", name, e)))
}

/// Contract bound to one transport of one chain client pair.
pub struct ContractHandle<M> {
    name: &'static str,
    transport: Transport,
    pair_id: Uuid,
    contract: Contract<M>,
}

impl<M: Middleware> ContractHandle<M> {
    fn bind(
        descriptor: &ContractDescriptor,
        client: Arc<M>,
        transport: Transport,
        pair_id: Uuid,
    ) -> Self {
        Self {
            name: descriptor.name,
            transport,
            pair_id,
            contract: Contract::new(descriptor.address, descriptor.abi.clone(), client),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// EIP-55 checksummed address
    pub fn checksummed_address(&self) -> String {
        to_checksum(&self.contract.address(), None)
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Chain client pair this handle reads through
    pub fn pair_id(&self) -> Uuid {
        self.pair_id
    }

    pub fn contract(&self) -> &Contract<M> {
        &self.contract
    }

    /// ABI-encodes a call to `function`, ready to be used as transaction data.
    pub fn calldata<T: Tokenize>(&self, function: &str, args: T) -> Result<Bytes, GatewayError> {
        let function = self
            .contract
            .abi()
            .function(function)
            .map_err(|e| GatewayError::InvalidAbi(format!("{}: {}", self.name, e)))?;
        let encoded = function
            .encode_input(&args.into_tokens())
            .map_err(|e| GatewayError::InvalidAbi(format!("{}: {}", self.name, e)))?;
        Ok(Bytes::from(encoded))
    }
}

impl<M> fmt::Debug for ContractHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("name", &self.name)
            .field("transport", &self.transport)
            .field("pair_id", &self.pair_id)
            .finish()
    }
}

/// Every contract handle derived from one chain client pair.
pub struct ContractRegistry<H = Http, S = Ws>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    pair_id: Uuid,
    generation: u64,
    http: Arc<Provider<H>>,
    aggregator: ContractHandle<Provider<H>>,
    prediction: ContractHandle<Provider<H>>,
    prediction_socket: ContractHandle<Provider<S>>,
}

impl<H, S> ContractRegistry<H, S>
where
    H: JsonRpcClient + 'static,
    S: JsonRpcClient + 'static,
{
    /// Binds the fixed contracts to `pair`. The aggregator is never read over
    /// the socket, so only the prediction contract gets a socket handle.
    pub fn bind(pair: &ChainClientPair<H, S>, contracts: &ContractSet, generation: u64) -> Self {
        let pair_id = pair.id();
        let http = pair.http();
        let socket = pair.socket();

        debug!(pair = %pair_id, generation, "Binding contract handles");

        Self {
            pair_id,
            generation,
            aggregator: ContractHandle::bind(
                &contracts.aggregator,
                Arc::clone(&http),
                Transport::Http,
                pair_id,
            ),
            prediction: ContractHandle::bind(
                &contracts.prediction,
                Arc::clone(&http),
                Transport::Http,
                pair_id,
            ),
            prediction_socket: ContractHandle::bind(
                &contracts.prediction,
                socket,
                Transport::Socket,
                pair_id,
            ),
            http,
        }
    }

    pub fn pair_id(&self) -> Uuid {
        self.pair_id
    }

    /// Rebuild generation that produced this registry
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// HTTP channel for point queries
    pub fn http(&self) -> Arc<Provider<H>> {
        Arc::clone(&self.http)
    }

    pub fn aggregator(&self) -> &ContractHandle<Provider<H>> {
        &self.aggregator
    }

    pub fn prediction(&self) -> &ContractHandle<Provider<H>> {
        &self.prediction
    }

    pub fn prediction_socket(&self) -> &ContractHandle<Provider<S>> {
        &self.prediction_socket
    }
}

impl<H, S> PartialEq for ContractRegistry<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    fn eq(&self, other: &Self) -> bool {
        self.pair_id == other.pair_id && self.generation == other.generation
    }
}

impl<H, S> fmt::Debug for ContractRegistry<H, S>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractRegistry")
            .field("pair_id", &self.pair_id)
            .field("generation", &self.generation)
            .finish()
    }
}
