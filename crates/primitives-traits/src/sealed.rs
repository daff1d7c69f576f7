//! A header paired with its own hash, so downstream code never has to
//! recompute `keccak256(rlp(header))` on every access.

use alloy_primitives::B256;
use std::ops::Deref;

use crate::Header;

/// A [`Header`] known to be paired with its own hash.
///
/// The hash is either the result of hashing the header (`seal_slow`) or a
/// caller-supplied value the caller has already validated (`seal`, e.g.
/// the keccak recomputation the Engine API's `newPayload` performs against
/// `payload.block_hash`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedHeader {
    header: Header,
    hash: B256,
}

impl SealedHeader {
    /// Pairs a header with an already-known hash.
    ///
    /// Callers are responsible for the hash actually matching; this is the
    /// fast path used once a hash has already been verified once (e.g. by
    /// `newPayload`'s `blockHash` check).
    pub const fn new_unchecked(header: Header, hash: B256) -> Self {
        Self { header, hash }
    }

    /// Hashes the header and pairs it with the result.
    pub fn seal_slow(header: Header) -> Self {
        let hash = header.hash_slow();
        Self { header, hash }
    }

    /// The header's hash.
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// Borrows the wrapped header.
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Splits this sealed header back into its parts.
    pub fn split(self) -> (Header, B256) {
        (self.header, self.hash)
    }
}

impl Deref for SealedHeader {
    type Target = Header;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}
