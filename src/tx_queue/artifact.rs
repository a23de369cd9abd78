use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::QueuedTransaction;
use crate::types::{Network, QueueName};

pub const BATCH_FORMAT_VERSION: &str = "1.0";

/// A reviewable batch of unsigned transactions, in execution order.
///
/// Laid out like a Safe transaction-builder batch, with the ABI and function
/// signature of every call kept alongside so it can be decoded offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchArtifact {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub meta: BatchMeta,
    pub transactions: Vec<BatchTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMeta {
    pub name: QueueName,
    pub network: Network,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTransaction {
    pub to: Address,
    /// Native value in wei, as a decimal string.
    pub value: String,
    pub data: Bytes,
    pub function_signature: String,
    pub abi: Value,
    pub contract_inputs_values: Map<String, Value>,
    pub sequence_index: u64,
}

impl From<&QueuedTransaction> for BatchTransaction {
    fn from(tx: &QueuedTransaction) -> Self {
        Self {
            to: tx.to,
            value: tx.value.to_string(),
            data: tx.data.clone(),
            function_signature: tx.function_signature.clone(),
            abi: tx.abi.clone(),
            contract_inputs_values: tx.human_readable_args.clone(),
            sequence_index: tx.sequence_index,
        }
    }
}

impl BatchArtifact {
    pub fn new(
        network: &Network,
        name: &QueueName,
        chain_id: Option<u64>,
        transactions: &[QueuedTransaction],
    ) -> Self {
        Self {
            version: BATCH_FORMAT_VERSION.to_string(),
            chain_id: chain_id.map(|id| id.to_string()),
            created_at: Utc::now(),
            meta: BatchMeta {
                name: name.clone(),
                network: network.clone(),
                description: format!(
                    "{} transaction(s) queued by {name} on {network}",
                    transactions.len()
                ),
            },
            transactions: transactions
                .iter()
                .map(BatchTransaction::from)
                .collect(),
        }
    }
}
