pub mod common;
pub mod inspect;
pub mod verify;

pub use self::common::ContractSpec;
pub use self::inspect::{ForgeInspect, InspectField};
pub use self::verify::ForgeVerify;
