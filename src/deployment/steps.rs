use std::sync::Arc;

use crate::config::{Config, ContractConfig, ContractKind};
use crate::deployment::{DeployedContracts, DeploymentContext};
use crate::dispatcher::VersionedImplTable;

pub mod configure;
pub mod contract;
pub mod proxy;
pub mod upgrade;

pub use self::contract::{DeployedContract, StepOutcome};

/// Everything a versioned deploy implementation gets to work with.
#[derive(Clone)]
pub struct DeployArgs {
    pub context: Arc<DeploymentContext>,
    pub config: Arc<Config>,
    pub contract: ContractConfig,
    pub deployed: DeployedContracts,
}

pub type DeployTable = VersionedImplTable<DeployArgs, Vec<DeployedContract>>;

/// Deploy implementations for every contract kind, selected by the
/// contract's configured version.
#[derive(Debug)]
pub struct DeployFamilies {
    standalone: DeployTable,
    proxy: DeployTable,
}

impl DeployFamilies {
    pub fn new() -> eyre::Result<Self> {
        let standalone = DeployTable::new(ContractKind::Standalone)
            .register("v1_0_0", contract::deploy_standalone_v1)?;

        let proxy = DeployTable::new(ContractKind::Proxy)
            .register("v1_0_0", proxy::deploy_proxy_v1)?
            .register("v2_0_0", proxy::deploy_proxy_v2)?;

        Ok(Self { standalone, proxy })
    }

    pub fn table(&self, kind: ContractKind) -> &DeployTable {
        match kind {
            ContractKind::Standalone => &self.standalone,
            ContractKind::Proxy => &self.proxy,
        }
    }
}
