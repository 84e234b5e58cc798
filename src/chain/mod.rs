pub mod clients;
pub mod contracts;

pub use clients::{ChainClientFactory, ChainClientPair, EndpointFactory};
pub use contracts::{ContractHandle, ContractRegistry, ContractSet, ContractDescriptor};
