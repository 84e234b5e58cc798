use std::str::FromStr;

use ethers::types::{Address, Bytes, TxHash, U256};
use serde::Serialize;
use tracing::{info, instrument};

use crate::chain::ChainClientFactory;
use crate::error::GatewayError;
use crate::gateway::Gateway;

/// Invoked once with the hash of an accepted transaction.
pub type SubmittedCallback = Box<dyn FnOnce(TxHash) + Send>;

/// Transaction a caller wants the wallet to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
    /// Defaults to the signer's first account
    pub from: Option<Address>,
}

impl TransactionRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: None,
            from: None,
        }
    }

    /// Request from a hex target address and hex calldata.
    pub fn from_hex(to: &str, data: &str) -> Result<Self, GatewayError> {
        let to = Address::from_str(to)
            .map_err(|e| GatewayError::Serialization(format!("Invalid target address: {}", e)))?;
        let data = hex::decode(data.trim_start_matches("0x"))?;
        Ok(Self::new(to, data))
    }

    pub fn with_value(mut self, value: impl Into<U256>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// Payload of `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionEnvelope {
    pub from: Address,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

impl TransactionEnvelope {
    /// Zero value is left out, same as no value.
    pub fn new(from: Address, request: &TransactionRequest) -> Self {
        Self {
            from,
            to: request.to,
            value: request.value.filter(|value| !value.is_zero()),
            data: request.data.clone(),
        }
    }
}

impl<F: ChainClientFactory> Gateway<F> {
    /// Asks the wallet to sign and broadcast `request`.
    ///
    /// `on_submitted` runs once with the hash after the wallet accepts. Nothing
    /// is retried.
    #[instrument(skip(self, request, on_submitted), fields(to = ?request.to))]
    pub async fn post_transaction(
        &self,
        request: TransactionRequest,
        on_submitted: Option<SubmittedCallback>,
    ) -> Result<TxHash, GatewayError> {
        let signer = self.signer()?;
        let from = match request.from {
            Some(from) => from,
            None => signer.address().await?,
        };

        let envelope = TransactionEnvelope::new(from, &request);
        let hash = signer.send_transaction(&envelope).await?;
        info!(tx_hash = ?hash, from = ?from, "Transaction submitted");

        if let Some(callback) = on_submitted {
            callback(hash);
        }
        Ok(hash)
    }
}
