//! revm wiring for the VM execution engine (§4.2): the in-memory state
//! database standing in for a Merkle-Patricia trie, the mainnet
//! block-execution strategy, post-block system operations, and the
//! execution engine's state machine itself.

mod database;
mod engine;
mod executor;
mod state_change;

pub use database::{load_genesis_alloc, InMemoryState, StateProviderDatabase};
pub use engine::{ChainStatus, ExecutionStatus, VmExecutionEngine, VmExecutionEngineConfig};
pub use executor::{EthExecutionStrategy, EthExecutionStrategyFactory};
