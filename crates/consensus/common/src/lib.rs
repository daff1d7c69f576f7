//! Shared validation and reward arithmetic reusable by any concrete
//! [`Consensus`](execution_consensus::Consensus) implementation.

pub mod calc;
pub mod validation;
