//! Input/output types threaded through a single block's execution (§4.2).

#![cfg_attr(not(feature = "std"), no_std)]

mod execute;

pub use execute::{BlockExecutionInput, BlockExecutionOutput};
