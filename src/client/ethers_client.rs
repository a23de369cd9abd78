use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ethers::prelude::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer, Wallet};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, H256};
use eyre::Context;
use reqwest::Url;
use tracing::{info, instrument};

use super::{
    ChainClient, SentTransaction, TransactionSender, UnsignedTransaction,
};
use crate::cli::PrivateKey;
use crate::error::DeployError;

type RpcSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

/// JSON-RPC client, optionally able to sign with a local key.
#[derive(Debug)]
pub struct EthersClient {
    provider: Provider<Http>,
    signer: Option<RpcSigner>,
    nonce: AtomicU64,
}

impl EthersClient {
    pub async fn connect(
        rpc_url: &Url,
        private_key: Option<&PrivateKey>,
    ) -> eyre::Result<Self> {
        let provider = Provider::try_from(rpc_url.as_str())
            .with_context(|| format!("Connecting to {rpc_url}"))?;

        let Some(private_key) = private_key else {
            return Ok(Self {
                provider,
                signer: None,
                nonce: AtomicU64::new(0),
            });
        };

        let chain_id = provider.get_chainid().await?;
        let wallet = Wallet::from(private_key.key.clone())
            .with_chain_id(chain_id.as_u64());

        let wallet_address = wallet.address();

        let signer = SignerMiddleware::new(provider.clone(), wallet);

        let nonce = signer.get_transaction_count(wallet_address, None).await?;

        info!(?wallet_address, %nonce, "Signer ready");

        Ok(Self {
            provider,
            signer: Some(signer),
            nonce: AtomicU64::new(nonce.as_u64()),
        })
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }
}

fn typed(tx: &UnsignedTransaction) -> TypedTransaction {
    TypedTransaction::Eip1559(
        Eip1559TransactionRequest::new()
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value),
    )
}

#[async_trait]
impl ChainClient for EthersClient {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|err| DeployError::external("eth_chainId", err))?;

        Ok(chain_id.as_u64())
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: H256,
    ) -> Result<H256, DeployError> {
        self.provider
            .get_storage_at(address, slot, None)
            .await
            .map_err(|err| DeployError::external("eth_getStorageAt", err))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, DeployError> {
        self.provider
            .get_code(address, None)
            .await
            .map_err(|err| DeployError::external("eth_getCode", err))
    }

    async fn call(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<Bytes, DeployError> {
        let mut request = typed(tx);

        if let Some(from) = self.signer_address() {
            request.set_from(from);
        }

        self.provider
            .call(&request, None)
            .await
            .map_err(|err| DeployError::external("eth_call", err))
    }
}

#[async_trait]
impl TransactionSender for EthersClient {
    #[instrument(skip_all, fields(to = ?tx.to))]
    async fn send(
        &self,
        tx: UnsignedTransaction,
    ) -> Result<SentTransaction, DeployError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            DeployError::invalid_input("sending requires a private key")
        })?;

        let mut request = typed(&tx);
        request.set_nonce(self.next_nonce());

        signer
            .fill_transaction(&mut request, None)
            .await
            .map_err(|err| DeployError::external("filling transaction", err))?;

        let pending = signer
            .send_transaction(request, None)
            .await
            .map_err(|err| DeployError::external("sending transaction", err))?;

        let receipt = pending
            .await
            .map_err(|err| DeployError::external("awaiting receipt", err))?
            .ok_or_else(|| {
                DeployError::external(
                    "awaiting receipt",
                    "transaction dropped from mempool",
                )
            })?;

        if receipt.status != Some(1.into()) {
            return Err(DeployError::external(
                "executing transaction",
                format!("transaction {:?} reverted", receipt.transaction_hash),
            ));
        }

        info!(hash = ?receipt.transaction_hash, "Transaction mined");

        Ok(SentTransaction {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|block| block.as_u64()),
        })
    }
}
