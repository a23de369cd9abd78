use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};

use super::{
    ChainClient, SentTransaction, TransactionSender, UnsignedTransaction,
};
use crate::error::DeployError;

/// Used when no RPC url is configured. Every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

fn unavailable(operation: &str) -> DeployError {
    DeployError::invalid_input(format!("{operation} requires an rpc url"))
}

#[async_trait]
impl ChainClient for Offline {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        Err(unavailable("eth_chainId"))
    }

    async fn get_storage_at(
        &self,
        _address: Address,
        _slot: H256,
    ) -> Result<H256, DeployError> {
        Err(unavailable("eth_getStorageAt"))
    }

    async fn get_code(&self, _address: Address) -> Result<Bytes, DeployError> {
        Err(unavailable("eth_getCode"))
    }

    async fn call(
        &self,
        _tx: &UnsignedTransaction,
    ) -> Result<Bytes, DeployError> {
        Err(unavailable("eth_call"))
    }
}

#[async_trait]
impl TransactionSender for Offline {
    async fn send(
        &self,
        _tx: UnsignedTransaction,
    ) -> Result<SentTransaction, DeployError> {
        Err(unavailable("sending a transaction"))
    }
}
