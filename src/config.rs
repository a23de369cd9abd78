use ethers::types::{Address, H256, U256};
use eyre::Context;
use serde::{Deserialize, Serialize};

use crate::dispatcher::{parse_version_tag, version_tag};
use crate::error::DeployError;
use crate::forge_utils::ContractSpec;
use crate::guard::InitializerSlot;
use crate::predictor::{salt_from_label, DETERMINISTIC_DEPLOYER};
use crate::types::{ContractName, QueueName};

pub const DEFAULT_PROXY_ARTIFACT: &str = "ERC1967Proxy";

fn default_factory() -> Address {
    DETERMINISTIC_DEPLOYER
}

fn default_proxy_artifact() -> String {
    DEFAULT_PROXY_ARTIFACT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// CREATE2 factory every contract is deployed through.
    #[serde(default = "default_factory")]
    pub factory: Address,

    /// Prepended to salt labels, so separate deployments can share a chain.
    #[serde(default)]
    pub salt_prefix: String,

    #[serde(default = "default_proxy_artifact")]
    pub proxy_artifact: String,

    /// Initializer tracking used for proxies that don't override it.
    #[serde(default)]
    pub initializer_slot: InitializerSlot,

    #[serde(default)]
    pub contracts: Vec<ContractConfig>,

    #[serde(default)]
    pub upgrades: Vec<UpgradeConfig>,

    #[serde(default)]
    pub calls: Vec<CallConfig>,
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractKind {
    #[default]
    Standalone,
    Proxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializerCall {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    pub name: ContractName,

    /// Compiler artifact, defaults to the contract name.
    #[serde(default)]
    pub artifact: Option<String>,

    #[serde(default)]
    pub kind: ContractKind,

    pub version: String,

    /// Either a raw 32 byte salt or a label that gets hashed.
    #[serde(default)]
    pub salt: Option<String>,

    /// Arguments may reference earlier contracts as `@Name`.
    #[serde(default)]
    pub constructor_args: Vec<String>,

    #[serde(default)]
    pub initializer: Option<InitializerCall>,

    #[serde(default)]
    pub initializer_slot: Option<InitializerSlot>,

    #[serde(default)]
    pub queue: Option<QueueName>,

    /// Redeploy when the recorded address no longer matches the prediction.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Name of the proxy as recorded in the registry.
    pub proxy: ContractName,

    pub artifact: String,

    pub version: String,

    #[serde(default)]
    pub salt: Option<String>,

    #[serde(default)]
    pub constructor_args: Vec<String>,

    #[serde(default)]
    pub initializer: Option<InitializerCall>,

    #[serde(default)]
    pub initializer_slot: Option<InitializerSlot>,

    #[serde(default)]
    pub queue: Option<QueueName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Address or `@Name` of a recorded contract.
    pub target: String,

    pub artifact: String,

    pub function: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Native value in wei.
    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub queue: Option<QueueName>,
}

impl CallConfig {
    pub fn value(&self) -> eyre::Result<U256> {
        match self.value.as_deref() {
            Some(value) => U256::from_dec_str(value).with_context(|| {
                format!("Invalid value {value} for {}", self.function)
            }),
            None => Ok(U256::zero()),
        }
    }
}

/// A raw 32 byte hex salt is used as is, anything else is hashed as a label.
pub fn resolve_salt(salt_prefix: &str, salt: &str) -> H256 {
    let raw = salt.strip_prefix("0x").unwrap_or(salt);

    if raw.len() == 64 {
        if let Ok(bytes) = hex::decode(raw) {
            return H256::from_slice(&bytes);
        }
    }

    salt_from_label(&format!("{salt_prefix}{salt}"))
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.factory.is_zero() {
            return Err(
                DeployError::invalid_input("factory is the zero address").into()
            );
        }

        let mut seen = std::collections::HashSet::new();

        for contract in &self.contracts {
            if !seen.insert(&contract.name) {
                eyre::bail!("Contract {} is listed twice", contract.name);
            }

            parse_version_tag(&contract.version)
                .with_context(|| format!("Contract {}", contract.name))?;
        }

        for upgrade in &self.upgrades {
            parse_version_tag(&upgrade.version)
                .with_context(|| format!("Upgrade of {}", upgrade.proxy))?;
        }

        Ok(())
    }
}

impl ContractConfig {
    pub fn artifact_spec(&self) -> ContractSpec {
        ContractSpec::parse(self.artifact.as_deref().unwrap_or(&self.name))
    }

    pub fn implementation_name(&self) -> ContractName {
        implementation_name(&self.name)
    }

    pub fn salt(&self, salt_prefix: &str) -> H256 {
        match self.salt.as_deref() {
            Some(salt) => resolve_salt(salt_prefix, salt),
            None => salt_from_label(&format!("{salt_prefix}{}", self.name)),
        }
    }

    pub fn implementation_salt(&self, salt_prefix: &str) -> eyre::Result<H256> {
        let version = parse_version_tag(&self.version)?;
        let label = self.salt.as_deref().unwrap_or(&self.name);

        Ok(salt_from_label(&format!(
            "{salt_prefix}{label}:implementation:{}",
            version_tag(&version)
        )))
    }
}

impl UpgradeConfig {
    pub fn artifact_spec(&self) -> ContractSpec {
        ContractSpec::parse(&self.artifact)
    }

    pub fn implementation_salt(&self, salt_prefix: &str) -> eyre::Result<H256> {
        if let Some(salt) = self.salt.as_deref() {
            return Ok(resolve_salt(salt_prefix, salt));
        }

        let version = parse_version_tag(&self.version)?;

        Ok(salt_from_label(&format!(
            "{salt_prefix}{}:implementation:{}",
            self.proxy,
            version_tag(&version)
        )))
    }
}

pub fn implementation_name(proxy: &ContractName) -> ContractName {
    ContractName::new(format!("{proxy}Implementation"))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::serde_utils::{self, Format};

    const CONFIG: &str = indoc! {r#"
        salt_prefix: "lending-v1:"
        contracts:
          - name: Oracle
            version: v1_0_0
            constructor_args: ["0x00000000000000000000000000000000000000aa"]
          - name: Pool
            kind: proxy
            version: v1_0_0
            initializer:
              function: initialize
              args: ["@Oracle"]
        calls:
          - target: "@Pool"
            artifact: Pool
            function: setFee
            args: ["30"]
            queue: configure-lending
    "#};

    #[test]
    fn parses_yaml_config() -> eyre::Result<()> {
        let config: Config = serde_utils::from_str(Format::Yaml, CONFIG)?;
        config.validate()?;

        assert_eq!(config.factory, DETERMINISTIC_DEPLOYER);
        assert_eq!(config.proxy_artifact, DEFAULT_PROXY_ARTIFACT);
        assert_eq!(config.initializer_slot, InitializerSlot::default());
        assert_eq!(config.contracts.len(), 2);
        assert_eq!(config.contracts[1].kind, ContractKind::Proxy);
        assert_eq!(
            config.calls[0].queue,
            Some(QueueName::from("configure-lending"))
        );

        Ok(())
    }

    #[test]
    fn salts_are_stable_and_distinct() -> eyre::Result<()> {
        let config: Config = serde_utils::from_str(Format::Yaml, CONFIG)?;
        let pool = &config.contracts[1];

        assert_eq!(
            pool.salt("lending-v1:"),
            salt_from_label("lending-v1:Pool")
        );
        assert_ne!(
            pool.salt("lending-v1:"),
            pool.implementation_salt("lending-v1:")?
        );
        assert_eq!(
            pool.implementation_name(),
            ContractName::from("PoolImplementation")
        );

        let raw = format!("0x{}", "11".repeat(32));
        assert_eq!(resolve_salt("ignored", &raw), H256::repeat_byte(0x11));

        Ok(())
    }

    #[test]
    fn duplicate_contracts_are_rejected() -> eyre::Result<()> {
        let mut config: Config = serde_utils::from_str(Format::Yaml, CONFIG)?;
        config.contracts.push(config.contracts[0].clone());

        assert!(config.validate().is_err());

        Ok(())
    }

    #[test]
    fn malformed_versions_are_rejected() -> eyre::Result<()> {
        let mut config: Config = serde_utils::from_str(Format::Yaml, CONFIG)?;
        config.contracts[0].version = "latest".to_string();

        assert!(config.validate().is_err());

        Ok(())
    }

    #[test]
    fn zero_factory_is_rejected() -> eyre::Result<()> {
        let mut config: Config = serde_utils::from_str(Format::Yaml, CONFIG)?;
        config.factory = Address::zero();

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<DeployError>().map(DeployError::kind),
            Some(crate::error::ErrorKind::InvalidInput)
        );

        Ok(())
    }
}
