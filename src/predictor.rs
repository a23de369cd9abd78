use ethers::types::{Address, H160, H256};
use ethers::utils::{get_create2_address_from_hash, keccak256};
use hex_literal::hex;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// The keyless deterministic deployment proxy present on most EVM chains.
///
/// Its calldata is `salt ++ init_code` and it returns the created address.
pub const DETERMINISTIC_DEPLOYER: Address =
    H160(hex!("4e59b44847b379578588920ca78fbf26c0b4956c"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedAddress {
    pub salt: H256,
    pub init_code_hash: H256,
    pub factory: Address,
    pub predicted: Address,
}

impl PredictedAddress {
    pub fn ensure_matches(&self, observed: Address) -> Result<(), DeployError> {
        if self.predicted != observed {
            return Err(DeployError::AddressMismatch {
                predicted: self.predicted,
                observed,
            });
        }

        Ok(())
    }
}

pub fn predict(
    factory: Address,
    salt: H256,
    init_code: &[u8],
) -> Result<PredictedAddress, DeployError> {
    if init_code.is_empty() {
        return Err(DeployError::InvalidInitCode);
    }

    let init_code_hash = H256(keccak256(init_code));
    let predicted =
        get_create2_address_from_hash(factory, salt, init_code_hash);

    Ok(PredictedAddress {
        salt,
        init_code_hash,
        factory,
        predicted,
    })
}

/// Derives a salt from a human readable label such as `"Liquidity:v1"`.
pub fn salt_from_label(label: &str) -> H256 {
    H256(keccak256(label.as_bytes()))
}

/// Calldata understood by [`DETERMINISTIC_DEPLOYER`].
pub fn factory_calldata(salt: H256, init_code: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(32 + init_code.len());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(init_code);
    data
}

/// Factories either return the raw 20 byte address or an abi encoded word.
pub fn decode_factory_return(data: &[u8]) -> Result<Address, DeployError> {
    match data.len() {
        20 => Ok(Address::from_slice(data)),
        32 => Ok(Address::from_slice(&data[12..])),
        len => Err(DeployError::invalid_input(format!(
            "factory returned {len} bytes, expected an address"
        ))),
    }
}
