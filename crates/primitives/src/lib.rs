//! Ethereum primitive types used across the execution core: blocks,
//! transactions, receipts and genesis definitions.
//!
//! Header, withdrawal and EIP-7685 request types are re-exported from
//! [`execution_primitives_traits`] rather than redefined here; this crate
//! builds the block/transaction/receipt shapes that sit around them.

#![cfg_attr(not(feature = "std"), no_std)]

pub use execution_primitives_traits::{
    Account, BlobSidecar, BlobSidecars, Bytecode, Header, Log, Request, SealedHeader,
    Withdrawal, Withdrawals,
};

pub use alloy_primitives::{
    Address, BlockHash, BlockNumber, Bloom, Bytes, ChainId, StorageKey, StorageValue, TxHash,
    TxIndex, TxNumber, B256, U256,
};

pub mod block;
pub mod genesis;
pub mod proofs;
pub mod receipt;
pub mod transaction;

pub use block::{Block, BlockBody, BlockWithSenders, SealedBlock, SealedBlockWithSenders};
pub use genesis::{ChainConfig, Genesis, GenesisAccount};
pub use receipt::{Receipt, ReceiptWithBloom, Receipts};
pub use transaction::{Transaction, TransactionSigned, TransactionSignedEcRecovered, TxType};
