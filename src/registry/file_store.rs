use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{DeploymentRecord, RegistryStore, Swap};
use crate::error::DeployError;
use crate::serde_utils;
use crate::types::{ContractName, Network};

/// One YAML document per network, `<root>/<network>.yml`.
#[derive(Debug)]
pub struct FileRegistryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NetworkDeployments {
    #[serde(default)]
    deployments: BTreeMap<ContractName, DeploymentRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    archive: BTreeMap<ContractName, Vec<DeploymentRecord>>,
}

impl FileRegistryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn network_path(
        &self,
        network: &Network,
    ) -> Result<PathBuf, DeployError> {
        Ok(self.root.join(format!("{}.yml", network.path_segment()?)))
    }

    async fn load(
        &self,
        network: &Network,
    ) -> Result<NetworkDeployments, DeployError> {
        let path = self.network_path(network)?;

        if !path.exists() {
            return Ok(NetworkDeployments::default());
        }

        serde_utils::read_deserialize(&path)
            .await
            .map_err(|err| DeployError::external("reading registry", err))
    }

    async fn store(
        &self,
        network: &Network,
        deployments: &NetworkDeployments,
    ) -> Result<(), DeployError> {
        let path = self.network_path(network)?;

        serde_utils::write_serialize(&path, deployments)
            .await
            .map_err(|err| DeployError::external("writing registry", err))?;

        debug!(path = %path.display(), "Registry persisted");

        Ok(())
    }
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn get(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        let mut file = self.load(network).await?;

        Ok(file.deployments.remove(name))
    }

    async fn compare_and_swap(
        &self,
        expected: Option<&DeploymentRecord>,
        new: DeploymentRecord,
    ) -> Result<Swap, DeployError> {
        let _guard = self.write_lock.lock().await;

        let mut file = self.load(&new.network).await?;

        let current = file.deployments.get(&new.name);
        if current != expected {
            return Ok(Swap::Stale(current.cloned()));
        }

        let network = new.network.clone();
        let name = new.name.clone();

        if let Some(previous) = file.deployments.insert(name.clone(), new) {
            file.archive.entry(name).or_default().push(previous);
        }

        self.store(&network, &file).await?;

        Ok(Swap::Stored)
    }

    async fn history(
        &self,
        network: &Network,
        name: &ContractName,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let mut file = self.load(network).await?;

        Ok(file.archive.remove(name).unwrap_or_default())
    }

    async fn list(
        &self,
        network: &Network,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let file = self.load(network).await?;

        Ok(file.deployments.into_values().collect())
    }
}
