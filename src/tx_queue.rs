use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ethers::types::{Address, Bytes, U256};
use eyre::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::client::PopulatedCall;
use crate::error::DeployError;
use crate::serde_utils;
use crate::types::{Network, QueueName};

pub mod artifact;

pub use self::artifact::BatchArtifact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub abi: Value,
    pub function_signature: String,
    pub human_readable_args: Map<String, Value>,
    pub sequence_index: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    transactions: Vec<QueuedTransaction>,
    next_index: u64,
}

impl Queue {
    pub fn transactions(&self) -> &[QueuedTransaction] {
        &self.transactions
    }

    fn push(&mut self, call: PopulatedCall) -> u64 {
        let sequence_index = self.next_index;
        self.next_index += 1;

        self.transactions.push(QueuedTransaction {
            to: call.tx.to,
            data: call.tx.data,
            value: call.tx.value,
            abi: call.abi,
            function_signature: call.function_signature,
            human_readable_args: call.human_readable_args,
            sequence_index,
        });

        sequence_index
    }
}

/// Named, append only queues of unsigned transactions.
///
/// Enqueuing never touches the chain; a queue only leaves memory through
/// [`TxQueue::process_queue`].
#[derive(Debug)]
pub struct TxQueue {
    batch_dir: PathBuf,
    chain_id: Option<u64>,
    queues: BTreeMap<QueueName, Queue>,
}

impl TxQueue {
    pub fn new(batch_dir: impl AsRef<Path>) -> Self {
        Self {
            batch_dir: batch_dir.as_ref().to_owned(),
            chain_id: None,
            queues: BTreeMap::new(),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn artifact_path(
        &self,
        network: &Network,
        name: &QueueName,
    ) -> Result<PathBuf, DeployError> {
        Ok(self
            .batch_dir
            .join(network.path_segment()?)
            .join(format!("{}.json", name.path_segment()?)))
    }

    #[instrument(
        skip(self, call),
        fields(to = ?call.tx.to, function = %call.function_signature)
    )]
    pub fn queue(&mut self, name: &QueueName, call: PopulatedCall) -> u64 {
        let sequence_index =
            self.queues.entry(name.clone()).or_default().push(call);

        info!(%name, sequence_index, "Queued transaction");

        sequence_index
    }

    pub fn pending(&self, name: &QueueName) -> &[QueuedTransaction] {
        self.queues
            .get(name)
            .map(Queue::transactions)
            .unwrap_or_default()
    }

    pub fn queue_names(&self) -> impl Iterator<Item = &QueueName> {
        self.queues.keys()
    }

    /// Writes the queue to its batch artifact and clears it.
    ///
    /// The queue is only dropped once the artifact is on disk; on failure it
    /// is left untouched. Returns `None` when there is nothing to write.
    #[instrument(skip(self))]
    pub async fn process_queue(
        &mut self,
        network: &Network,
        name: &QueueName,
    ) -> eyre::Result<Option<BatchArtifact>> {
        let transactions = self.pending(name);

        if transactions.is_empty() {
            info!("Nothing queued, skipping");
            return Ok(None);
        }

        let path = self.artifact_path(network, name)?;

        let artifact =
            BatchArtifact::new(network, name, self.chain_id, transactions);

        let content = serde_json::to_vec_pretty(&artifact)?;

        let write_path = path.clone();
        tokio::task::spawn_blocking(move || {
            serde_utils::write_atomic(&write_path, &content)
        })
        .await?
        .with_context(|| format!("Writing batch {name} for {network}"))?;

        self.queues.remove(name);

        info!(
            path = %path.display(),
            transactions = artifact.transactions.len(),
            "Batch written"
        );

        Ok(Some(artifact))
    }

    /// Processes every non-empty queue, in name order.
    pub async fn process_all(
        &mut self,
        network: &Network,
    ) -> eyre::Result<Vec<BatchArtifact>> {
        let names: Vec<_> = self.queue_names().cloned().collect();

        let mut artifacts = vec![];
        for name in names {
            if let Some(artifact) = self.process_queue(network, &name).await? {
                artifacts.push(artifact);
            }
        }

        Ok(artifacts)
    }
}
