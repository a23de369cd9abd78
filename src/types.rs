use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::error::DeployError;

/// Names used as file names must not leave the directory they are joined to.
fn check_path_segment(kind: &str, value: &str) -> Result<(), DeployError> {
    if value.is_empty() {
        return Err(DeployError::invalid_input(format!("empty {kind}")));
    }

    if value.contains(['/', '\\', '\0']) || value.contains("..") {
        return Err(DeployError::invalid_input(format!(
            "{kind} {value:?} can't be used as a file name"
        )));
    }

    Ok(())
}

macro_rules! impl_name {
    (pub struct $outer:ident) => {
        #[derive(
            Debug,
            Clone,
            Serialize,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Deserialize,
            Shrinkwrap,
        )]
        #[serde(transparent)]
        pub struct $outer(pub String);

        impl $outer {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The name, if it is safe to use as a single path component.
            pub fn path_segment(&self) -> Result<&str, DeployError> {
                check_path_segment(stringify!($outer), &self.0)?;

                Ok(&self.0)
            }
        }

        impl std::fmt::Display for $outer {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $outer {
            type Err = DeployError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_path_segment(stringify!($outer), s)?;

                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $outer {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

impl_name!(pub struct ContractName);
impl_name!(pub struct Network);
impl_name!(pub struct QueueName);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn names_must_be_single_path_components() {
        for bad in ["", "../escaped", "a/b", "a\\b", "..", "x..y"] {
            let err = bad.parse::<Network>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad:?}");

            assert!(QueueName::from(bad).path_segment().is_err(), "{bad:?}");
        }

        assert_eq!(
            "base-sepolia".parse::<Network>().ok(),
            Some(Network::from("base-sepolia"))
        );
        assert_eq!(
            QueueName::from("vault.setup").path_segment().ok(),
            Some("vault.setup")
        );
    }
}
