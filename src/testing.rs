//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{MockProvider, Provider};
use ethers::types::{Address, H256};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::chain::{ChainClientFactory, ChainClientPair};
use crate::config::{GatewayConfig, GatewayConfigBuilder};
use crate::connector::{Eip1193Provider, WalletSession};
use crate::error::{GatewayError, ProviderRpcError};
use crate::gateway::Gateway;

pub fn test_config() -> GatewayConfig {
    GatewayConfigBuilder::new(
        "http://127.0.0.1:8545".to_string(),
        "ws://127.0.0.1:8546".to_string(),
        80001,
        Address::from_low_u64_be(0xa11),
        Address::from_low_u64_be(0xb22),
    )
    .build()
}

/// Gateway over [`MockFactory`] with a fresh wallet session.
pub fn test_gateway(injected: Option<Arc<dyn Eip1193Provider>>) -> Gateway<MockFactory> {
    Gateway::new(
        test_config(),
        MockFactory::new(),
        Arc::new(WalletSession::new()),
        injected,
    )
    .unwrap()
}

#[derive(Debug, Clone)]
pub enum SendBehavior {
    Hash(H256),
    Reject,
    Fail(i64, String),
    NoHash,
}

/// Scriptable EIP-1193 wallet.
#[derive(Debug)]
pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    selected: Mutex<Option<Address>>,
    chain_id: u64,
    reject_connection: Mutex<bool>,
    fail_accounts: Mutex<bool>,
    send: Mutex<SendBehavior>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockWallet {
    pub fn new(account: Address, chain_id: u64) -> Self {
        Self {
            accounts: Mutex::new(vec![account]),
            selected: Mutex::new(Some(account)),
            chain_id,
            reject_connection: Mutex::new(false),
            fail_accounts: Mutex::new(false),
            send: Mutex::new(SendBehavior::Hash(H256::from_low_u64_be(0xfeed))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_connection(&self) {
        *self.reject_connection.lock().unwrap() = true;
    }

    pub fn fail_accounts(&self) {
        *self.fail_accounts.lock().unwrap() = true;
    }

    pub fn set_send(&self, behavior: SendBehavior) {
        *self.send.lock().unwrap() = behavior;
    }

    pub fn deselect(&self) {
        *self.selected.lock().unwrap() = None;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl Eip1193Provider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        match method {
            "eth_requestAccounts" => {
                if *self.reject_connection.lock().unwrap() {
                    return Err(ProviderRpcError::user_rejected());
                }
                Ok(json!(*self.accounts.lock().unwrap()))
            }
            "eth_accounts" => {
                if *self.fail_accounts.lock().unwrap() {
                    return Err(ProviderRpcError::new(-32603, "internal wallet error"));
                }
                Ok(json!(*self.accounts.lock().unwrap()))
            }
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.chain_id))),
            "eth_sendTransaction" => match self.send.lock().unwrap().clone() {
                SendBehavior::Hash(hash) => Ok(json!(hash)),
                SendBehavior::Reject => Err(ProviderRpcError::user_rejected()),
                SendBehavior::Fail(code, message) => Err(ProviderRpcError::new(code, message)),
                SendBehavior::NoHash => Ok(Value::Null),
            },
            other => Err(ProviderRpcError::new(
                -32601,
                format!("method {} not supported", other),
            )),
        }
    }

    fn selected_address(&self) -> Option<Address> {
        *self.selected.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStep {
    pub delay: Duration,
    pub fail: bool,
}

/// Chain client factory backed by ethers' mock transport.
#[derive(Debug, Default)]
pub struct MockFactory {
    plan: Mutex<VecDeque<BuildStep>>,
    calls: Mutex<usize>,
    built: Mutex<Vec<(usize, Uuid, MockProvider)>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(steps: Vec<BuildStep>) -> Self {
        Self {
            plan: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    /// Pair id produced by the `call`-th (zero based) connect.
    pub fn pair_for_call(&self, call: usize) -> Option<Uuid> {
        self.built
            .lock()
            .unwrap()
            .iter()
            .find(|(index, _, _)| *index == call)
            .map(|(_, id, _)| *id)
    }

    /// HTTP mock of the most recently built pair.
    pub fn latest_http(&self) -> Option<MockProvider> {
        self.built
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, mock)| mock.clone())
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChainClientFactory for MockFactory {
    type Http = MockProvider;
    type Socket = MockProvider;

    async fn connect(&self) -> Result<ChainClientPair<MockProvider, MockProvider>, GatewayError> {
        let (index, step) = {
            let mut calls = self.calls.lock().unwrap();
            let index = *calls;
            *calls += 1;
            let step = self.plan.lock().unwrap().pop_front().unwrap_or_default();
            (index, step)
        };

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        if step.fail {
            return Err(GatewayError::ChainClient("endpoint unreachable".to_string()));
        }

        let (http, http_mock) = Provider::mocked();
        let (socket, _) = Provider::mocked();
        let pair = ChainClientPair::new(http, socket);
        self.built
            .lock()
            .unwrap()
            .push((index, pair.id(), http_mock));
        Ok(pair)
    }
}
