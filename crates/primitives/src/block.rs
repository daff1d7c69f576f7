//! Block types.
//!
//! A block carries a header plus its body (§3): transactions, ommers
//! (kept only for pre-merge RLP compatibility — post-merge blocks always
//! have an empty ommer list), withdrawals (Shanghai) and EIP-7685
//! requests (Prague). Blob sidecars are deliberately not part of this
//! type; see [`execution_primitives_traits::blob_sidecar`].

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{
    transaction::{self, TransactionSigned},
    Header, Request, SealedHeader, Withdrawals,
};

/// The body of a block: everything besides the header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    /// Transactions, in the order they were executed.
    pub transactions: Vec<TransactionSigned>,
    /// Ommer/uncle headers. Always empty from the Merge onward.
    pub ommers: Vec<Header>,
    /// Withdrawals, once Shanghai is active for the block's timestamp.
    pub withdrawals: Option<Withdrawals>,
    /// EIP-7685 requests, once Prague is active for the block's timestamp.
    pub requests: Option<Request>,
}

impl BlockBody {
    /// Whether the body contains any EIP-4844 blob transactions.
    pub fn has_blob_transactions(&self) -> bool {
        self.transactions.iter().any(transaction::is_eip4844)
    }

    /// An iterator over the blob transactions in the body, if any.
    pub fn blob_transactions_iter(&self) -> impl Iterator<Item = &TransactionSigned> + '_ {
        self.transactions.iter().filter(|tx| transaction::is_eip4844(tx))
    }
}

/// A full Ethereum block: an unsealed header paired with its body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The block body.
    pub body: BlockBody,
}

impl Block {
    /// Seals the block with an already-known hash.
    ///
    /// WARNING: does not verify that `hash` is actually `keccak256(rlp(header))`.
    pub fn seal(self, hash: B256) -> SealedBlock {
        SealedBlock { header: SealedHeader::new_unchecked(self.header, hash), body: self.body }
    }

    /// Hashes the header and seals the block with the result.
    pub fn seal_slow(self) -> SealedBlock {
        SealedBlock { header: SealedHeader::seal_slow(self.header), body: self.body }
    }

    /// Recovers the sender of every transaction in the block body.
    ///
    /// Returns `None` if any transaction's signature does not recover,
    /// mirroring the all-or-nothing semantics the VM execution engine
    /// needs before it can replay the block (§4.2).
    pub fn senders(&self) -> Option<Vec<Address>> {
        transaction::recover_signers(&self.body.transactions)
    }

    /// Pairs the block with a caller-supplied sender list without
    /// recovering signatures.
    ///
    /// Returns `None` if `senders.len()` does not match the number of
    /// transactions in the body.
    pub fn with_senders_unchecked(self, senders: Vec<Address>) -> Option<BlockWithSenders> {
        BlockWithSenders::new(self, senders)
    }

    /// Whether the block body contains any EIP-4844 blob transactions.
    pub fn has_blob_transactions(&self) -> bool {
        self.body.has_blob_transactions()
    }
}

/// A [`Block`] together with the senders of each of its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockWithSenders {
    /// The block.
    pub block: Block,
    /// Senders, one per transaction in `block.body.transactions`, in order.
    pub senders: Vec<Address>,
}

impl BlockWithSenders {
    /// Pairs a block with its senders. Returns `None` if the lengths
    /// don't line up.
    pub fn new(block: Block, senders: Vec<Address>) -> Option<Self> {
        (block.body.transactions.len() == senders.len()).then_some(Self { block, senders })
    }

    /// Seals the block with an already-known hash.
    pub fn seal(self, hash: B256) -> SealedBlockWithSenders {
        let Self { block, senders } = self;
        SealedBlockWithSenders { block: block.seal(hash), senders }
    }

    /// Hashes the header and seals the block with the result.
    pub fn seal_slow(self) -> SealedBlockWithSenders {
        SealedBlockWithSenders { block: self.block.seal_slow(), senders: self.senders }
    }

    /// Splits the structure back into its parts.
    pub fn into_components(self) -> (Block, Vec<Address>) {
        (self.block, self.senders)
    }

    /// Iterates over `(sender, transaction)` pairs in body order.
    pub fn transactions_with_sender(
        &self,
    ) -> impl Iterator<Item = (&Address, &TransactionSigned)> + '_ {
        self.senders.iter().zip(self.block.body.transactions.iter())
    }
}

/// A [`Block`] whose header is paired with its own hash and can no
/// longer be mutated without re-sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlock {
    /// The sealed header.
    pub header: SealedHeader,
    /// The block body.
    pub body: BlockBody,
}

impl SealedBlock {
    /// Builds a sealed block from a sealed header and a body.
    pub const fn new(header: SealedHeader, body: BlockBody) -> Self {
        Self { header, body }
    }

    /// The header's hash.
    pub fn hash(&self) -> B256 {
        self.header.hash()
    }

    /// The header's parent hash.
    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// The block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Recovers the sender of every transaction in the block body.
    pub fn senders(&self) -> Option<Vec<Address>> {
        transaction::recover_signers(&self.body.transactions)
    }

    /// Recovers senders and pairs them with the block, consuming it.
    pub fn try_seal_with_senders(self) -> Result<SealedBlockWithSenders, Self> {
        match self.senders() {
            Some(senders) => Ok(SealedBlockWithSenders { block: self, senders }),
            None => Err(self),
        }
    }

    /// Strips the seal, returning the plain [`Block`].
    pub fn unseal(self) -> Block {
        let (header, _hash) = self.header.split();
        Block { header, body: self.body }
    }

    /// Whether the body contains any EIP-4844 blob transactions.
    pub fn has_blob_transactions(&self) -> bool {
        self.body.has_blob_transactions()
    }
}

/// A [`SealedBlock`] together with the senders of each of its
/// transactions. This is the shape the VM execution engine and chain
/// store pass around once a block is ready to be replayed or indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlockWithSenders {
    /// The sealed block.
    pub block: SealedBlock,
    /// Senders, one per transaction, in body order.
    pub senders: Vec<Address>,
}

impl SealedBlockWithSenders {
    /// Pairs a sealed block with its senders. Returns `None` if the
    /// lengths don't line up.
    pub fn new(block: SealedBlock, senders: Vec<Address>) -> Option<Self> {
        (block.body.transactions.len() == senders.len()).then_some(Self { block, senders })
    }

    /// Splits the structure back into its parts.
    pub fn into_components(self) -> (SealedBlock, Vec<Address>) {
        (self.block, self.senders)
    }

    /// Iterates over `(sender, transaction)` pairs in body order.
    pub fn transactions_with_sender(
        &self,
    ) -> impl Iterator<Item = (&Address, &TransactionSigned)> + '_ {
        self.senders.iter().zip(self.block.body.transactions.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_with_senders_rejects_length_mismatch() {
        let block = Block::default();
        assert!(BlockWithSenders::new(block, vec![Address::ZERO]).is_none());
    }

    #[test]
    fn seal_then_unseal_roundtrips_header() {
        let block = Block::default();
        let sealed = block.clone().seal_slow();
        let hash = sealed.hash();
        let unsealed = sealed.unseal();
        assert_eq!(unsealed, block);
        assert_eq!(unsealed.header.hash_slow(), hash);
    }
}
