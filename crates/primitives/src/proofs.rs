//! Trie root calculations used to validate a block's header fields
//! against its body.
//!
//! The Merkle-Patricia trie itself is an external black-box capability
//! (§1 Non-goals); these helpers only compute the three ordered-list
//! roots a received block's header commits to, using `alloy-trie`'s
//! ordered-trie builder.

use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::B256;
use alloy_rlp::Encodable;

use crate::{transaction::TransactionSigned, Withdrawals};

/// Computes the transactions root: an ordered trie keyed by RLP-encoded
/// transaction index over each transaction's EIP-2718 encoding.
pub fn calculate_transaction_root(transactions: &[TransactionSigned]) -> B256 {
    alloy_trie::root::ordered_trie_root_with_encoder(transactions, |tx, buf| {
        alloy_eips::eip2718::Encodable2718::encode_2718(tx, buf)
    })
}

/// Computes the receipts root the same way: an ordered trie over each
/// receipt's EIP-2718 encoding.
pub fn calculate_receipt_root(receipts: &[crate::receipt::Receipt]) -> B256 {
    alloy_trie::root::ordered_trie_root_with_encoder(receipts, |receipt, buf| {
        receipt.encode_2718(buf)
    })
}

/// Computes the withdrawals root (Shanghai, EIP-4895): an ordered trie
/// over each withdrawal's plain RLP encoding.
pub fn calculate_withdrawals_root(withdrawals: &Withdrawals) -> B256 {
    alloy_trie::root::ordered_trie_root(withdrawals.iter().map(|w| {
        let mut buf = Vec::new();
        w.encode(&mut buf);
        buf
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transactions_root_matches_empty_root() {
        let root = calculate_transaction_root(&[]);
        assert_eq!(root, execution_primitives_traits::constants::EMPTY_ROOT_HASH);
    }

    #[test]
    fn empty_withdrawals_root_matches_empty_root() {
        let root = calculate_withdrawals_root(&Withdrawals::default());
        assert_eq!(root, execution_primitives_traits::constants::EMPTY_ROOT_HASH);
    }
}
