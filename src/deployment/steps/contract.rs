use ethers::types::{Address, Bytes, H256};
use eyre::Context;
use semver::Version;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::DeployArgs;
use crate::artifacts::ContractArtifact;
use crate::client::{SentTransaction, UnsignedTransaction};
use crate::config::Config;
use crate::deployment::DeploymentContext;
use crate::dispatcher::parse_version_tag;
use crate::error::DeployError;
use crate::forge_utils::ContractSpec;
use crate::predictor::{self, PredictedAddress};
use crate::registry::{DeployedAt, DeploymentRecord, PutOutcome};
use crate::types::ContractName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepOutcome {
    /// A transaction created the contract during this run.
    Deployed,
    /// Code was already at the predicted address and has been recorded.
    Preexisting,
    /// The registry already had the contract, nothing was done.
    AlreadySatisfied,
    /// Only the address was computed.
    Predicted,
}

/// One CREATE2 deployment through the configured factory.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub name: ContractName,
    pub spec: ContractSpec,
    pub version: Version,
    pub salt: H256,
    pub init_code: Bytes,
    /// Encoded constructor arguments, passed on to source verification.
    pub constructor_args: Bytes,
    /// Replace a recorded deployment at a different address.
    pub force: bool,
}

impl DeployRequest {
    pub fn new(
        name: ContractName,
        artifact: &ContractArtifact,
        version: Version,
        salt: H256,
        init_code: Bytes,
    ) -> Self {
        let constructor_args = Bytes::from(
            init_code
                .get(artifact.bytecode.len()..)
                .unwrap_or_default()
                .to_vec(),
        );

        Self {
            name,
            spec: artifact.spec.clone(),
            version,
            salt,
            init_code,
            constructor_args,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployedContract {
    pub name: ContractName,
    pub address: Address,
    pub version: Version,
    pub outcome: StepOutcome,
}

/// Deploys `request` unless the registry already knows about it.
///
/// The factory call is simulated first and the returned address must equal
/// the prediction before anything is broadcast.
#[instrument(
    skip_all,
    fields(name = %request.name, version = %request.version)
)]
pub async fn deploy_contract(
    context: &DeploymentContext,
    config: &Config,
    request: DeployRequest,
) -> eyre::Result<DeployedContract> {
    let predicted =
        predictor::predict(config.factory, request.salt, &request.init_code)?;

    if context.predict_only {
        return Ok(deployed(
            &request,
            predicted.predicted,
            StepOutcome::Predicted,
        ));
    }

    if let Some(existing) = context
        .registry
        .find(&request.name, &context.network)
        .await?
    {
        if existing.address == predicted.predicted || !request.force {
            if existing.address != predicted.predicted {
                warn!(
                    recorded = ?existing.address,
                    predicted = ?predicted.predicted,
                    "Recorded deployment differs from the current configuration"
                );
            } else if existing.version != request.version {
                warn!(recorded = %existing.version, "Recorded version differs");
            }

            info!(address = ?existing.address, "Already deployed, skipping");

            return Ok(DeployedContract {
                name: existing.name,
                address: existing.address,
                version: existing.version,
                outcome: StepOutcome::AlreadySatisfied,
            });
        }
    }

    let code = context.client.get_code(predicted.predicted).await?;

    if !code.is_empty() {
        info!(
            address = ?predicted.predicted,
            "Code already present, recording"
        );

        record(context, &request, &predicted, DeployedAt::Preexisting).await?;

        return Ok(deployed(
            &request,
            predicted.predicted,
            StepOutcome::Preexisting,
        ));
    }

    let sent = broadcast(context, config, &request, &predicted).await?;

    record(
        context,
        &request,
        &predicted,
        DeployedAt::Transaction {
            hash: sent.hash,
            block: sent.block_number,
        },
    )
    .await?;

    context
        .verify(
            request.spec.clone(),
            predicted.predicted,
            request.constructor_args.clone(),
        )
        .await;

    Ok(deployed(&request, predicted.predicted, StepOutcome::Deployed))
}

async fn broadcast(
    context: &DeploymentContext,
    config: &Config,
    request: &DeployRequest,
    predicted: &PredictedAddress,
) -> eyre::Result<SentTransaction> {
    let tx = UnsignedTransaction::new(
        config.factory,
        predictor::factory_calldata(request.salt, &request.init_code),
    );

    let returned = context.client.call(&tx).await?;
    let observed = predictor::decode_factory_return(&returned)?;
    predicted.ensure_matches(observed)?;

    info!(address = ?predicted.predicted, "Deploying");

    let sent = context.sender.send(tx).await?;

    let code = context.client.get_code(predicted.predicted).await?;
    if code.is_empty() {
        return Err(DeployError::external(
            "deploying",
            format!(
                "no code at {:?} after transaction {:?}",
                predicted.predicted, sent.hash
            ),
        )
        .into());
    }

    info!(address = ?predicted.predicted, hash = ?sent.hash, "Deployed");

    Ok(sent)
}

async fn record(
    context: &DeploymentContext,
    request: &DeployRequest,
    predicted: &PredictedAddress,
    deployed_at: DeployedAt,
) -> eyre::Result<PutOutcome> {
    let record = DeploymentRecord {
        name: request.name.clone(),
        address: predicted.predicted,
        network: context.network.clone(),
        deployed_at,
        version: request.version.clone(),
    };

    let outcome = context
        .registry
        .put(record, request.force)
        .await
        .with_context(|| format!("Recording {}", request.name))?;

    Ok(outcome)
}

fn deployed(
    request: &DeployRequest,
    address: Address,
    outcome: StepOutcome,
) -> DeployedContract {
    DeployedContract {
        name: request.name.clone(),
        address,
        version: request.version.clone(),
        outcome,
    }
}

/// Builds the request for a plain contract from its configuration.
pub async fn standalone_request(
    args: &DeployArgs,
) -> eyre::Result<DeployRequest> {
    let DeployArgs {
        context,
        config,
        contract,
        deployed,
    } = args;

    let artifact = context.artifacts.artifact(&contract.artifact_spec()).await?;

    let constructor_args = deployed.resolve_args(&contract.constructor_args)?;
    let tokens = artifact.constructor_tokens(&constructor_args)?;
    let init_code = artifact.init_code(&tokens)?;

    Ok(DeployRequest::new(
        contract.name.clone(),
        &artifact,
        parse_version_tag(&contract.version)?,
        contract.salt(&config.salt_prefix),
        init_code,
    )
    .with_force(contract.force))
}

pub async fn deploy_standalone_v1(
    args: DeployArgs,
) -> eyre::Result<Vec<DeployedContract>> {
    let request = standalone_request(&args).await?;

    let deployed = deploy_contract(&args.context, &args.config, request).await?;

    Ok(vec![deployed])
}
