use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, Bytes};
use eyre::Context;
use tracing::{info, instrument};

use super::contract::{deploy_contract, DeployRequest, DeployedContract};
use super::DeployArgs;
use crate::artifacts::ContractArtifact;
use crate::client::{CallBuilder, PopulatedCall};
use crate::config::InitializerCall;
use crate::deployment::DeployedContracts;
use crate::dispatcher::parse_version_tag;
use crate::forge_utils::ContractSpec;

/// Encodes the initializer against the implementation's abi.
pub fn initializer_call(
    artifact: &ContractArtifact,
    initializer: &InitializerCall,
    deployed: &DeployedContracts,
    to: Address,
) -> eyre::Result<PopulatedCall> {
    CallBuilder::default()
        .abi(artifact.abi.clone())
        .function_name(&initializer.function)
        .raw_args(deployed.resolve_args(&initializer.args)?)
        .to(to)
        .build()
        .with_context(|| format!("Encoding initializer of {}", artifact.spec))
}

async fn deploy_implementation(
    args: &DeployArgs,
) -> eyre::Result<(DeployedContract, Arc<ContractArtifact>)> {
    let DeployArgs {
        context,
        config,
        contract,
        deployed,
    } = args;

    let artifact = context.artifacts.artifact(&contract.artifact_spec()).await?;

    let constructor_args = deployed.resolve_args(&contract.constructor_args)?;
    let tokens = artifact.constructor_tokens(&constructor_args)?;

    let request = DeployRequest::new(
        contract.implementation_name(),
        &artifact,
        parse_version_tag(&contract.version)?,
        contract.implementation_salt(&config.salt_prefix)?,
        artifact.init_code(&tokens)?,
    )
    .with_force(contract.force);

    let implementation = deploy_contract(context, config, request).await?;

    Ok((implementation, artifact))
}

async fn deploy_proxy(
    args: &DeployArgs,
    implementation: Address,
    data: Bytes,
) -> eyre::Result<DeployedContract> {
    let DeployArgs {
        context,
        config,
        contract,
        ..
    } = args;

    let proxy_artifact = context
        .artifacts
        .artifact(&ContractSpec::parse(&config.proxy_artifact))
        .await?;

    let init_code = proxy_artifact.init_code(&[
        Token::Address(implementation),
        Token::Bytes(data.to_vec()),
    ])?;

    let request = DeployRequest::new(
        contract.name.clone(),
        &proxy_artifact,
        parse_version_tag(&contract.version)?,
        contract.salt(&config.salt_prefix),
        init_code,
    )
    .with_force(contract.force);

    deploy_contract(context, config, request).await
}

/// Implementation plus an ERC1967 proxy that runs the initializer from its
/// constructor.
#[instrument(skip_all, fields(name = %args.contract.name))]
pub async fn deploy_proxy_v1(
    args: DeployArgs,
) -> eyre::Result<Vec<DeployedContract>> {
    let (implementation, artifact) = deploy_implementation(&args).await?;

    let data = match args.contract.initializer.as_ref() {
        Some(initializer) => {
            initializer_call(
                &artifact,
                initializer,
                &args.deployed,
                implementation.address,
            )?
            .tx
            .data
        }
        None => Bytes::default(),
    };

    let proxy = deploy_proxy(&args, implementation.address, data).await?;

    Ok(vec![implementation, proxy])
}

/// Implementation plus a proxy constructed without data. The initializer is
/// queued for the proxy's owner instead of being executed by the deployer.
#[instrument(skip_all, fields(name = %args.contract.name))]
pub async fn deploy_proxy_v2(
    args: DeployArgs,
) -> eyre::Result<Vec<DeployedContract>> {
    let (implementation, artifact) = deploy_implementation(&args).await?;

    let proxy =
        deploy_proxy(&args, implementation.address, Bytes::default()).await?;

    if let Some(initializer) = args.contract.initializer.as_ref() {
        let call = initializer_call(
            &artifact,
            initializer,
            &args.deployed,
            proxy.address,
        )?;

        let slot = args
            .contract
            .initializer_slot
            .unwrap_or(args.config.initializer_slot);

        if args.context.predict_only {
            info!("Predicting only, initializer not queued");
        } else if args
            .context
            .guard(slot)
            .should_initialize(proxy.address)
            .await?
        {
            let sequence_index = args
                .context
                .queue(args.contract.queue.as_ref(), call)
                .await;

            info!(sequence_index, "Queued initializer");
        } else {
            info!(
                proxy = ?proxy.address,
                "Proxy already initialized, skipping"
            );
        }
    }

    Ok(vec![implementation, proxy])
}
