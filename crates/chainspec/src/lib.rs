//! Chain specification: genesis allocation plus the hardfork activation
//! schedule a chain was configured with.

mod base_fee;
mod spec;

pub use base_fee::BaseFeeParams;
pub use spec::{ChainSpec, ChainSpecBuilder, DEV, MAINNET, SEPOLIA};
