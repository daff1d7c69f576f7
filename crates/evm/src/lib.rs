//! Trait boundary between the chain-agnostic VM execution engine and a
//! concrete revm wiring (§4.2).
//!
//! This crate defines *shapes* only — [`ConfigureEvm`] for building revm's
//! environments from a header, and [`execute::BlockExecutionStrategy`] /
//! [`execute::BlockExecutorProvider`] for running a block end to end.
//! `execution-revm` is the mainnet-Ethereum implementation; the VM
//! execution engine in that crate is generic over both traits so a
//! different chain could substitute its own.

pub mod configure;
pub mod execute;

pub use configure::{ConfigureEvm, EthEvmConfig};
