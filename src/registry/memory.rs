use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DeploymentRecord, RegistryStore, Swap};
use crate::error::DeployError;
use crate::types::{ContractName, Network};

type Key = (Network, ContractName);

/// Ephemeral store, nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    live: BTreeMap<Key, DeploymentRecord>,
    archive: HashMap<Key, Vec<DeploymentRecord>>,
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn get(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        let inner = self.inner.lock().await;

        Ok(inner.live.get(&(network.clone(), name.clone())).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: Option<&DeploymentRecord>,
        new: DeploymentRecord,
    ) -> Result<Swap, DeployError> {
        let mut inner = self.inner.lock().await;

        let key = (new.network.clone(), new.name.clone());
        let current = inner.live.get(&key);

        if current != expected {
            return Ok(Swap::Stale(current.cloned()));
        }

        if let Some(previous) = inner.live.insert(key.clone(), new) {
            inner.archive.entry(key).or_default().push(previous);
        }

        Ok(Swap::Stored)
    }

    async fn history(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let inner = self.inner.lock().await;

        Ok(inner
            .archive
            .get(&(network.clone(), name.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list(
        &self,
        network: &Network,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let inner = self.inner.lock().await;

        Ok(inner
            .live
            .iter()
            .filter(|((record_network, _), _)| record_network == network)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
