use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::DeployError;
use crate::types::{ContractName, Network};

pub mod file_store;
pub mod memory;

pub use self::file_store::FileRegistryStore;
pub use self::memory::MemoryRegistryStore;

/// Where a deployment came from. Opaque to the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeployedAt {
    Transaction {
        hash: H256,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block: Option<u64>,
    },
    /// Code was already present at the predicted address.
    Preexisting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: ContractName,
    pub address: Address,
    pub network: Network,
    pub deployed_at: DeployedAt,
    pub version: Version,
}

impl DeploymentRecord {
    fn validate(&self) -> Result<(), DeployError> {
        if self.name.is_empty() {
            return Err(DeployError::invalid_input("empty contract name"));
        }

        self.network.path_segment()?;

        if self.address.is_zero() {
            return Err(DeployError::invalid_input(format!(
                "zero address for {} on {}",
                self.name, self.network
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Unchanged,
    Redeployed,
}

/// Result of a compare-and-swap attempt against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Swap {
    Stored,
    /// The stored value differed from the expected one; carries what was found.
    Stale(Option<DeploymentRecord>),
}

/// Durable, network scoped key-value storage for deployment records.
///
/// Every write must be durable once the returned future resolves.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Option<DeploymentRecord>, DeployError>;

    /// Replaces the live record for `new`'s key iff the current one equals
    /// `expected`. A replaced record is moved to the archive.
    async fn compare_and_swap(
        &self,
        expected: Option<&DeploymentRecord>,
        new: DeploymentRecord,
    ) -> Result<Swap, DeployError>;

    /// Archived (superseded) records for a key, oldest first.
    async fn history(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Vec<DeploymentRecord>, DeployError>;

    async fn list(
        &self,
        network: &Network,
    ) -> Result<Vec<DeploymentRecord>, DeployError>;
}

#[async_trait]
impl<T> RegistryStore for Arc<T>
where
    T: RegistryStore + ?Sized,
{
    async fn get(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        (**self).get(network, name).await
    }

    async fn compare_and_swap(
        &self,
        expected: Option<&DeploymentRecord>,
        new: DeploymentRecord,
    ) -> Result<Swap, DeployError> {
        (**self).compare_and_swap(expected, new).await
    }

    async fn history(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        (**self).history(network, name).await
    }

    async fn list(
        &self,
        network: &Network,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        (**self).list(network).await
    }
}

#[derive(Debug)]
pub struct DeploymentRegistry<S> {
    store: S,
}

impl<S> DeploymentRegistry<S>
where
    S: RegistryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn find(
        &self,
        name: &ContractName,
        network: &Network,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        self.store.get(network, name).await
    }

    pub async fn get(
        &self,
        name: &ContractName,
        network: &Network,
    ) -> Result<DeploymentRecord, DeployError> {
        self.find(name, network)
            .await?
            .ok_or_else(|| DeployError::NotFound {
                name: name.clone(),
                network: network.clone(),
            })
    }

    pub async fn has(
        &self,
        name: &ContractName,
        network: &Network,
    ) -> Result<bool, DeployError> {
        Ok(self.find(name, network).await?.is_some())
    }

    pub async fn history(
        &self,
        name: &ContractName,
        network: &Network,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        self.store.history(network, name).await
    }

    pub async fn list(
        &self,
        network: &Network,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        self.store.list(network).await
    }

    #[instrument(
        skip(self, record),
        fields(
            name = %record.name,
            network = %record.network,
            address = ?record.address,
        )
    )]
    pub async fn put(
        &self,
        record: DeploymentRecord,
        force: bool,
    ) -> Result<PutOutcome, DeployError> {
        record.validate()?;

        let existing = self.store.get(&record.network, &record.name).await?;

        let outcome = match existing.as_ref() {
            Some(existing) if *existing == record => {
                return Ok(PutOutcome::Unchanged);
            }
            Some(existing) if existing.address != record.address && !force => {
                return Err(DeployError::DeploymentConflict {
                    name: record.name,
                    network: record.network,
                    existing: existing.address,
                    attempted: record.address,
                });
            }
            Some(_) => PutOutcome::Redeployed,
            None => PutOutcome::Created,
        };

        match self
            .store
            .compare_and_swap(existing.as_ref(), record.clone())
            .await?
        {
            Swap::Stored => {}
            Swap::Stale(found) => {
                return Err(DeployError::ConcurrentUpdate {
                    name: record.name,
                    network: record.network,
                    found: found.map(|record| record.address),
                });
            }
        }

        info!(?outcome, "Recorded deployment");

        Ok(outcome)
    }
}
