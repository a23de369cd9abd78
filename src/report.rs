use std::path::PathBuf;

use serde::Serialize;

use crate::deployment::steps::configure::QueuedCall;
use crate::deployment::steps::upgrade::ProxyUpgrade;
use crate::deployment::steps::DeployedContract;
use crate::types::{Network, QueueName};

/// What a single run did, printed once it finishes.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub network: Network,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contracts: Vec<DeployedContract>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upgrades: Vec<ProxyUpgrade>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<QueuedCall>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<BatchSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub queue: QueueName,
    pub transactions: usize,
    pub path: PathBuf,
}

impl Report {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            contracts: vec![],
            upgrades: vec![],
            calls: vec![],
            batches: vec![],
        }
    }
}
