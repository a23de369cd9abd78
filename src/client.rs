use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

pub mod call_builder;
pub mod ethers_client;
pub mod offline;

pub use self::call_builder::{CallBuilder, PopulatedCall};
pub use self::ethers_client::EthersClient;
pub use self::offline::Offline;

/// A populated call that has not been signed or sent.
///
/// Only a [`TransactionSender`] can turn it into a [`SentTransaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl UnsignedTransaction {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::zero(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A transaction that was broadcast and mined successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: H256,
    pub block_number: Option<u64>,
}

/// Read access to a chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, DeployError>;

    async fn get_storage_at(
        &self,
        address: Address,
        slot: H256,
    ) -> Result<H256, DeployError>;

    async fn get_code(&self, address: Address) -> Result<Bytes, DeployError>;

    /// Executes `tx` against the latest state without creating a transaction.
    async fn call(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<Bytes, DeployError>;
}

/// Broadcasts transactions. Never used for queued transactions.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    async fn send(
        &self,
        tx: UnsignedTransaction,
    ) -> Result<SentTransaction, DeployError>;
}
