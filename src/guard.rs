use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::{Address, Bytes, H256};
use hex_literal::hex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::{CallBuilder, ChainClient, PopulatedCall};
use crate::error::DeployError;

/// `keccak256("eip1967.proxy.implementation") - 1`
pub const IMPLEMENTATION_SLOT: H256 = H256(hex!(
    "360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc"
));

/// Where a contract family tracks initialization, and what "done" looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitializerSlot {
    pub slot: H256,
    pub sentinel: H256,
    /// Reject values that are neither zero nor the sentinel.
    pub strict: bool,
}

impl Default for InitializerSlot {
    fn default() -> Self {
        Self {
            slot: H256::zero(),
            sentinel: H256::from_low_u64_be(1),
            strict: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeDecision {
    pub proxy: Address,
    pub already_initialized: bool,
    pub initialize_calldata: Option<Bytes>,
    pub call: PopulatedCall,
}

pub fn upgradeable_proxy_abi() -> eyre::Result<Abi> {
    let abi = parse_abi(&[
        "function upgradeTo(address newImplementation)",
        "function upgradeToAndCall(address newImplementation, bytes data) payable",
    ])?;

    Ok(abi)
}

pub struct UpgradeGuard<'a, C: ?Sized> {
    client: &'a C,
    slot: InitializerSlot,
}

impl<'a, C> UpgradeGuard<'a, C>
where
    C: ChainClient + ?Sized,
{
    pub fn new(client: &'a C, slot: InitializerSlot) -> Self {
        Self { client, slot }
    }

    /// The implementation an ERC1967 proxy currently delegates to.
    pub async fn current_implementation(
        &self,
        proxy: Address,
    ) -> Result<Address, DeployError> {
        let value =
            self.client.get_storage_at(proxy, IMPLEMENTATION_SLOT).await?;

        Ok(Address::from(value))
    }

    #[instrument(skip(self))]
    pub async fn should_initialize(
        &self,
        proxy: Address,
    ) -> Result<bool, DeployError> {
        let value = self.client.get_storage_at(proxy, self.slot.slot).await?;

        if value == self.slot.sentinel {
            return Ok(false);
        }

        if !value.is_zero() {
            if self.slot.strict {
                return Err(DeployError::UnexpectedInitializerState {
                    proxy,
                    value,
                });
            }

            warn!(
                ?value,
                "Initializer slot holds neither zero nor the sentinel, \
                 treating as uninitialized"
            );
        }

        Ok(true)
    }

    /// Builds the upgrade call for `proxy`, attaching `init_calldata` only if
    /// the proxy has not been initialized yet.
    #[instrument(skip(self, init_calldata))]
    pub async fn plan_upgrade(
        &self,
        proxy: Address,
        new_implementation: Address,
        init_calldata: Option<Bytes>,
    ) -> eyre::Result<UpgradeDecision> {
        let should_initialize = self.should_initialize(proxy).await?;

        let init_calldata = init_calldata.filter(|data| !data.is_empty());

        let initialize_calldata = match (should_initialize, init_calldata) {
            (true, calldata) => calldata,
            (false, Some(_)) => {
                warn!(
                    ?proxy,
                    "Proxy is already initialized, \
                     dropping supplied initializer calldata"
                );
                None
            }
            (false, None) => {
                info!(?proxy, "Proxy already initialized");
                None
            }
        };

        let builder = CallBuilder::default()
            .abi(upgradeable_proxy_abi()?)
            .to(proxy);

        let call = match initialize_calldata.as_ref() {
            Some(data) => builder
                .function_name("upgradeToAndCall")
                .args(vec![
                    Token::Address(new_implementation),
                    Token::Bytes(data.to_vec()),
                ])
                .build()?,
            None => builder
                .function_name("upgradeTo")
                .args(vec![Token::Address(new_implementation)])
                .build()?,
        };

        Ok(UpgradeDecision {
            proxy,
            already_initialized: !should_initialize,
            initialize_calldata,
            call,
        })
    }
}
