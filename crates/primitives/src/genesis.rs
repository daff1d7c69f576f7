//! Genesis state and chain configuration.
//!
//! Re-exported from `alloy-genesis` rather than redefined: the JSON shape
//! of a genesis file (`alloc`, `config`, base-fee/gas-limit/timestamp
//! fields) is a wire format shared with every other Ethereum client, and
//! diverging from it would make this crate unable to load real chain
//! genesis files.

pub use alloy_genesis::{ChainConfig, Genesis, GenesisAccount};
