use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{Abi, Token};
use ethers::types::Bytes;
use eyre::{Context, ContextCompat};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::DeployError;
use crate::forge_utils::{ContractSpec, ForgeInspect, InspectField};

/// Compiler output for one contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub spec: ContractSpec,
    pub abi: Abi,
    pub abi_json: Value,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn from_parts(
        spec: ContractSpec,
        abi_json: Value,
        bytecode: Bytes,
    ) -> eyre::Result<Self> {
        let abi: Abi = serde_json::from_value(abi_json.clone())
            .with_context(|| format!("Parsing abi of {spec}"))?;

        Ok(Self {
            spec,
            abi,
            abi_json,
            bytecode,
        })
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn init_code(
        &self,
        constructor_args: &[Token],
    ) -> Result<Bytes, DeployError> {
        if self.bytecode.is_empty() {
            return Err(DeployError::InvalidInitCode);
        }

        let Some(constructor) = self.abi.constructor() else {
            if !constructor_args.is_empty() {
                return Err(DeployError::invalid_input(format!(
                    "{} has no constructor but {} arguments were given",
                    self.spec,
                    constructor_args.len()
                )));
            }

            return Ok(self.bytecode.clone());
        };

        constructor
            .encode_input(self.bytecode.to_vec(), constructor_args)
            .map(Bytes::from)
            .map_err(|err| {
                DeployError::invalid_input(format!(
                    "constructor arguments for {}: {err}",
                    self.spec
                ))
            })
    }

    /// Tokenizes textual constructor arguments against the constructor's types.
    pub fn constructor_tokens(
        &self,
        raw: &[String],
    ) -> eyre::Result<Vec<Token>> {
        let params = self
            .abi
            .constructor()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();

        if params.len() != raw.len() {
            eyre::bail!(
                "{} expects {} constructor arguments, got {}",
                self.spec,
                params.len(),
                raw.len()
            );
        }

        params
            .iter()
            .zip(raw)
            .map(|(param, value)| {
                LenientTokenizer::tokenize(&param.kind, value).with_context(|| {
                    format!(
                        "Constructor argument {} of {} is not a valid {}: \
                         {value}",
                        param.name, self.spec, param.kind
                    )
                })
            })
            .collect()
    }
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn artifact(
        &self,
        spec: &ContractSpec,
    ) -> eyre::Result<Arc<ContractArtifact>>;
}

/// Reads artifacts from a foundry project through `forge inspect`.
#[derive(Debug)]
pub struct ForgeArtifacts {
    project_dir: PathBuf,
    cache: Mutex<HashMap<ContractSpec, Arc<ContractArtifact>>>,
}

impl ForgeArtifacts {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_owned(),
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ArtifactSource for ForgeArtifacts {
    #[instrument(skip(self))]
    async fn artifact(
        &self,
        spec: &ContractSpec,
    ) -> eyre::Result<Arc<ContractArtifact>> {
        let mut cache = self.cache.lock().await;

        if let Some(artifact) = cache.get(spec) {
            return Ok(artifact.clone());
        }

        let abi = ForgeInspect::new(spec.clone(), InspectField::Abi)
            .with_cwd(&self.project_dir)
            .run()
            .await?;

        let bytecode = ForgeInspect::new(spec.clone(), InspectField::Bytecode)
            .with_cwd(&self.project_dir)
            .run()
            .await?;

        let abi_json: Value = serde_json::from_str(&abi)
            .with_context(|| format!("Parsing forge abi output for {spec}"))?;

        let bytecode: Bytes =
            bytecode.parse().ok().with_context(|| {
                format!("Parsing forge bytecode output for {spec}")
            })?;

        let artifact = Arc::new(ContractArtifact::from_parts(
            spec.clone(),
            abi_json,
            bytecode,
        )?);

        cache.insert(spec.clone(), artifact.clone());

        Ok(artifact)
    }
}
