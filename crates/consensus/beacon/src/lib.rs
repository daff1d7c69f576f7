//! Skeleton sync and the message-driven beacon consensus engine (§4.5,
//! §4.6, §9).

mod engine;
mod skeleton;

pub use engine::{
    BeaconConsensusEngine, BeaconConsensusEngineConfig, BeaconConsensusEngineHandle,
    BeaconEngineMessage, ForkchoiceOutcome,
};
pub use skeleton::{FillStatus, Skeleton, Subchain, DEFAULT_HEADER_CACHE_CAPACITY};
