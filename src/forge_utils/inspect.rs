use std::path::{Path, PathBuf};

use strum::{Display, EnumString};
use tracing::{debug, instrument};

use super::common::ContractSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InspectField {
    Abi,
    Bytecode,
}

pub struct ForgeInspect {
    cwd: Option<PathBuf>,
    contract_spec: ContractSpec,
    field: InspectField,
}

impl ForgeInspect {
    pub fn new(contract_spec: ContractSpec, field: InspectField) -> Self {
        Self {
            cwd: None,
            contract_spec,
            field,
        }
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    #[instrument(
        name = "forge_inspect",
        skip_all,
        fields(contract = %self.contract_spec, field = %self.field)
    )]
    pub async fn run(&self) -> eyre::Result<String> {
        let mut cmd = tokio::process::Command::new("forge");

        cmd.arg("inspect");

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.arg(self.contract_spec.to_string());

        cmd.arg(self.field.to_string());

        debug!("Inspecting contract with {cmd:#?}");

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("forge inspect failed: {}", stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
