use std::error::Error as StdError;

use ethers::types::Address;
use semver::Version;

use crate::types::{ContractName, Network};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Broad classification used by pipelines to decide whether to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    UnsupportedVersion,
    ExternalCollaboratorFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("init code is empty")]
    InvalidInitCode,

    #[error("no deployment of {name} on {network}")]
    NotFound { name: ContractName, network: Network },

    #[error(
        "{name} on {network} is already deployed at {existing:?}, \
         refusing to overwrite with {attempted:?} without force"
    )]
    DeploymentConflict {
        name: ContractName,
        network: Network,
        existing: Address,
        attempted: Address,
    },

    #[error(
        "registry entry for {name} on {network} changed concurrently, \
         now at {found:?}"
    )]
    ConcurrentUpdate {
        name: ContractName,
        network: Network,
        found: Option<Address>,
    },

    #[error(
        "predicted address {predicted:?} but deployment landed at \
         {observed:?}"
    )]
    AddressMismatch { predicted: Address, observed: Address },

    #[error("{operation} has no implementation for version {version}")]
    UnsupportedVersion { operation: String, version: Version },

    #[error("{operation} already has an implementation for version {version}")]
    DuplicateVersion { operation: String, version: Version },

    #[error(
        "initializer slot of {proxy:?} holds {value:?}, \
         expected zero or the sentinel"
    )]
    UnexpectedInitializerState { proxy: Address, value: ethers::types::H256 },

    #[error("{operation} failed")]
    ExternalCollaborator {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl DeployError {
    pub fn invalid_input(message: impl ToString) -> Self {
        Self::InvalidInput(message.to_string())
    }

    pub fn external(
        operation: impl ToString,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ExternalCollaborator {
            operation: operation.to_string(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidInitCode
            | Self::NotFound { .. }
            | Self::DuplicateVersion { .. } => ErrorKind::InvalidInput,
            Self::DeploymentConflict { .. }
            | Self::ConcurrentUpdate { .. }
            | Self::AddressMismatch { .. } => ErrorKind::Conflict,
            Self::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Self::UnexpectedInitializerState { .. }
            | Self::ExternalCollaborator { .. } => {
                ErrorKind::ExternalCollaboratorFailure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let conflict = DeployError::AddressMismatch {
            predicted: Address::zero(),
            observed: Address::repeat_byte(1),
        };
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let external = DeployError::external("get_storage_at", io);
        assert_eq!(external.kind(), ErrorKind::ExternalCollaboratorFailure);
        assert!(external.source().is_some());

        assert_eq!(
            DeployError::InvalidInitCode.kind(),
            ErrorKind::InvalidInput
        );
    }
}
