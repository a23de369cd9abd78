use std::sync::Arc;

use ethers::types::Address;
use serde::Serialize;
use tracing::{info, instrument};

use super::contract::{deploy_contract, DeployRequest, DeployedContract};
use super::proxy::initializer_call;
use crate::config::{implementation_name, Config, UpgradeConfig};
use crate::deployment::{DeployedContracts, DeploymentContext};
use crate::dispatcher::parse_version_tag;
use crate::types::ContractName;

#[derive(Debug, Clone, Serialize)]
pub struct ProxyUpgrade {
    pub proxy: ContractName,
    pub proxy_address: Address,
    pub implementation: DeployedContract,
    /// Sequence index in the queue, `None` when the proxy already points at
    /// the implementation.
    pub queued: Option<u64>,
    pub initializes: bool,
}

/// Deploys the new implementation and queues the upgrade of `upgrade.proxy`.
#[instrument(skip_all, fields(proxy = %upgrade.proxy))]
pub async fn upgrade_proxy(
    context: &DeploymentContext,
    config: &Config,
    upgrade: &UpgradeConfig,
    deployed: &DeployedContracts,
) -> eyre::Result<ProxyUpgrade> {
    let proxy_address = deployed.address(&upgrade.proxy)?;

    let artifact = context.artifacts.artifact(&upgrade.artifact_spec()).await?;

    let constructor_args = deployed.resolve_args(&upgrade.constructor_args)?;
    let tokens = artifact.constructor_tokens(&constructor_args)?;

    let request = DeployRequest::new(
        implementation_name(&upgrade.proxy),
        &artifact,
        parse_version_tag(&upgrade.version)?,
        upgrade.implementation_salt(&config.salt_prefix)?,
        artifact.init_code(&tokens)?,
    )
    .with_force(true);

    let implementation = deploy_contract(context, config, request).await?;

    let init_calldata = upgrade
        .initializer
        .as_ref()
        .map(|initializer| {
            initializer_call(&artifact, initializer, deployed, proxy_address)
        })
        .transpose()?
        .map(|call| call.tx.data);

    if context.predict_only {
        return Ok(ProxyUpgrade {
            proxy: upgrade.proxy.clone(),
            proxy_address,
            implementation,
            queued: None,
            initializes: init_calldata.is_some(),
        });
    }

    let guard = context.guard(
        upgrade
            .initializer_slot
            .unwrap_or(config.initializer_slot),
    );

    let current = guard.current_implementation(proxy_address).await?;

    if current == implementation.address {
        info!("Proxy already points at the implementation, skipping");

        return Ok(ProxyUpgrade {
            proxy: upgrade.proxy.clone(),
            proxy_address,
            implementation,
            queued: None,
            initializes: false,
        });
    }

    let decision = guard
        .plan_upgrade(proxy_address, implementation.address, init_calldata)
        .await?;

    let initializes = decision.initialize_calldata.is_some();
    let sequence_index =
        context.queue(upgrade.queue.as_ref(), decision.call).await;

    Ok(ProxyUpgrade {
        proxy: upgrade.proxy.clone(),
        proxy_address,
        implementation,
        queued: Some(sequence_index),
        initializes,
    })
}

pub async fn upgrade(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
    deployed: &mut DeployedContracts,
) -> eyre::Result<Vec<ProxyUpgrade>> {
    let mut upgrades = vec![];

    for upgrade in &config.upgrades {
        let result = upgrade_proxy(
            context.as_ref(),
            config.as_ref(),
            upgrade,
            deployed,
        )
        .await?;

        deployed.insert(
            result.implementation.name.clone(),
            result.implementation.address,
        );

        upgrades.push(result);
    }

    Ok(upgrades)
}
