use std::collections::BTreeMap;

use ethers::types::Address;
use eyre::ContextCompat;

use crate::error::DeployError;
use crate::registry::{DeploymentRegistry, RegistryStore};
use crate::types::{ContractName, Network};

/// Addresses produced by earlier steps, looked up by later ones.
///
/// Arguments in the configuration refer to them as `@Name`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeployedContracts {
    addresses: BTreeMap<ContractName, Address>,
}

impl DeployedContracts {
    pub async fn from_registry<S: RegistryStore>(
        registry: &DeploymentRegistry<S>,
        network: &Network,
    ) -> eyre::Result<Self> {
        let addresses = registry
            .list(network)
            .await?
            .into_iter()
            .map(|record| (record.name, record.address))
            .collect();

        Ok(Self { addresses })
    }

    pub fn insert(&mut self, name: ContractName, address: Address) {
        self.addresses.insert(name, address);
    }

    pub fn address(&self, name: &ContractName) -> eyre::Result<Address> {
        self.addresses
            .get(name)
            .copied()
            .with_context(|| format!("{name} has not been deployed yet"))
    }

    /// An `@Name` reference or a literal, non-zero address.
    pub fn resolve_address(&self, target: &str) -> eyre::Result<Address> {
        let address = match target.strip_prefix('@') {
            Some(name) => self.address(&ContractName::from(name))?,
            None => target
                .parse()
                .ok()
                .with_context(|| format!("Invalid address {target}"))?,
        };

        if address.is_zero() {
            return Err(DeployError::invalid_input(format!(
                "{target} resolves to the zero address"
            ))
            .into());
        }

        Ok(address)
    }

    /// Replaces `@Name` references with addresses, leaves anything else as is.
    pub fn resolve_args(&self, args: &[String]) -> eyre::Result<Vec<String>> {
        args.iter()
            .map(|arg| match arg.strip_prefix('@') {
                Some(name) => Ok(format!("{:?}", self.address(&name.into())?)),
                None => Ok(arg.clone()),
            })
            .collect()
    }
}
