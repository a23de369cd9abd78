use std::path::PathBuf;
use std::sync::Arc;

use ethers::types::{Address, Bytes};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::artifacts::ArtifactSource;
use crate::client::{ChainClient, PopulatedCall, TransactionSender};
use crate::error::DeployError;
use crate::forge_utils::{ContractSpec, ForgeVerify};
use crate::guard::{InitializerSlot, UpgradeGuard};
use crate::registry::{DeploymentRegistry, RegistryStore};
use crate::report::BatchSummary;
use crate::tx_queue::TxQueue;
use crate::types::{Network, QueueName};

pub struct DeploymentContext {
    pub network: Network,
    pub registry: DeploymentRegistry<Arc<dyn RegistryStore>>,
    pub client: Arc<dyn ChainClient>,
    pub sender: Arc<dyn TransactionSender>,
    pub artifacts: Arc<dyn ArtifactSource>,
    pub tx_queue: Mutex<TxQueue>,
    /// Queue for steps whose configuration doesn't name one.
    pub default_queue: QueueName,
    pub contracts_dir: PathBuf,
    pub chain_id: Option<u64>,
    pub etherscan_api_key: Option<String>,
    /// Compute addresses only, never read or write chain state.
    pub predict_only: bool,
}

impl DeploymentContext {
    pub fn guard(
        &self,
        slot: InitializerSlot,
    ) -> UpgradeGuard<'_, dyn ChainClient> {
        UpgradeGuard::new(self.client.as_ref(), slot)
    }

    pub async fn queue(
        &self,
        queue: Option<&QueueName>,
        call: PopulatedCall,
    ) -> u64 {
        let name = queue.unwrap_or(&self.default_queue);

        self.tx_queue.lock().await.queue(name, call)
    }

    /// Writes every pending queue of this network to its batch artifact.
    pub async fn flush_queues(&self) -> eyre::Result<Vec<BatchSummary>> {
        let mut tx_queue = self.tx_queue.lock().await;

        let artifacts = tx_queue.process_all(&self.network).await?;

        if artifacts.is_empty() {
            info!("No transactions were queued");
        }

        let summaries = artifacts
            .into_iter()
            .map(|artifact| {
                Ok(BatchSummary {
                    path: tx_queue
                        .artifact_path(&self.network, &artifact.meta.name)?,
                    transactions: artifact.transactions.len(),
                    queue: artifact.meta.name,
                })
            })
            .collect::<Result<_, DeployError>>()?;

        Ok(summaries)
    }

    pub fn forge_verify(
        &self,
        spec: ContractSpec,
        address: Address,
    ) -> Option<ForgeVerify> {
        let etherscan_api_key = self.etherscan_api_key.as_ref()?;
        let chain_id = self.chain_id?;

        Some(
            ForgeVerify::new(spec, address)
                .with_root(&self.contracts_dir)
                .with_chain(chain_id)
                .with_etherscan_api_key(etherscan_api_key),
        )
    }

    /// Explorer verification is best effort, failures are only logged.
    pub async fn verify(
        &self,
        spec: ContractSpec,
        address: Address,
        constructor_args: Bytes,
    ) {
        let Some(forge_verify) = self.forge_verify(spec, address) else {
            return;
        };

        if let Err(err) = forge_verify
            .with_constructor_args(constructor_args)
            .run()
            .await
        {
            warn!(?address, "Source verification failed: {err:?}");
        }
    }
}
