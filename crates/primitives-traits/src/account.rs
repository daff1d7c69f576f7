//! State-trie account representation.
//!
//! The Merkle-Patricia trie itself is an external black-box capability
//! (§1 Non-goals); this module only defines the plain-old-data shape of an
//! account leaf so the VM execution engine and chain-state caches have a
//! common currency to pass around.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::KECCAK_EMPTY;

/// An Ethereum account as stored in the state trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    /// Number of transactions sent from this account, or for contracts the
    /// number of contracts created.
    pub nonce: u64,
    /// Account balance, in wei.
    pub balance: U256,
    /// Hash of the account's bytecode, or [`KECCAK_EMPTY`] for EOAs.
    pub bytecode_hash: Option<B256>,
}

impl Account {
    /// Whether this account has no code, i.e. is an externally-owned
    /// account.
    pub fn is_empty_code_hash(&self) -> bool {
        self.bytecode_hash.is_none() || self.bytecode_hash == Some(KECCAK_EMPTY)
    }

    /// Returns `true` if the account has not been touched: zero nonce,
    /// zero balance and no code. Used by state-clearing logic (EIP-161)
    /// the way the teacher's pre-execution checks use it.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.is_empty_code_hash()
    }
}

/// Contract bytecode, keyed in the state cache by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bytecode(pub alloy_primitives::Bytes);

impl Bytecode {
    /// Returns the keccak256 hash of the bytecode.
    pub fn hash_slow(&self) -> B256 {
        if self.0.is_empty() {
            KECCAK_EMPTY
        } else {
            alloy_primitives::keccak256(&self.0)
        }
    }
}
