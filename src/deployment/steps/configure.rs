use std::sync::Arc;

use eyre::Context;
use serde::Serialize;
use tracing::instrument;

use crate::client::CallBuilder;
use crate::config::{CallConfig, Config};
use crate::deployment::{DeployedContracts, DeploymentContext};
use crate::forge_utils::ContractSpec;
use crate::types::QueueName;

#[derive(Debug, Clone, Serialize)]
pub struct QueuedCall {
    pub queue: QueueName,
    pub function_signature: String,
    pub sequence_index: u64,
}

#[instrument(
    skip_all,
    fields(target = %call.target, function = %call.function)
)]
pub async fn queue_call(
    context: &DeploymentContext,
    call: &CallConfig,
    deployed: &DeployedContracts,
) -> eyre::Result<QueuedCall> {
    let artifact = context
        .artifacts
        .artifact(&ContractSpec::parse(&call.artifact))
        .await?;

    let populated = CallBuilder::default()
        .abi(artifact.abi.clone())
        .function_name(&call.function)
        .raw_args(deployed.resolve_args(&call.args)?)
        .to(deployed.resolve_address(&call.target)?)
        .value(call.value()?)
        .build()
        .with_context(|| {
            format!("Populating {} on {}", call.function, call.target)
        })?;

    let queue = call
        .queue
        .clone()
        .unwrap_or_else(|| context.default_queue.clone());

    let function_signature = populated.function_signature.clone();
    let sequence_index = context.queue(Some(&queue), populated).await;

    Ok(QueuedCall {
        queue,
        function_signature,
        sequence_index,
    })
}

pub async fn configure(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
    deployed: &DeployedContracts,
) -> eyre::Result<Vec<QueuedCall>> {
    let mut queued = vec![];

    for call in &config.calls {
        queued.push(queue_call(context.as_ref(), call, deployed).await?);
    }

    Ok(queued)
}
