//! EIP-4844 blob sidecars.
//!
//! Sidecars are never committed to the block header (§3 "A block carries
//! ... optional blob sidecars (not committed to header)"); they travel
//! alongside a block only long enough to be gossiped and indexed by
//! versioned hash, so this type is kept deliberately separate from
//! [`crate::Header`]/`Block`.

use alloy_eips::eip4844::BlobTransactionSidecar;
use alloy_primitives::B256;
use alloy_rlp::{Decodable, Encodable, RlpDecodableWrapper, RlpEncodableWrapper};
use derive_more::{Deref, DerefMut, From, IntoIterator};
use serde::{Deserialize, Serialize};

/// A list of [`BlobSidecar`]s, in the order their transactions appear in
/// the block body.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Default,
    From,
    Deref,
    DerefMut,
    IntoIterator,
    RlpEncodableWrapper,
    RlpDecodableWrapper,
    Serialize,
    Deserialize,
)]
pub struct BlobSidecars(Vec<BlobSidecar>);

impl BlobSidecars {
    /// Creates a new sidecar list.
    pub const fn new(sidecars: Vec<BlobSidecar>) -> Self {
        Self(sidecars)
    }

    /// Number of sidecars in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single blob sidecar bound to the transaction and block that included
/// it, used to answer the blob-and-proof indices described in §3.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlobSidecar {
    /// Blobs, KZG commitments and proofs carried by the originating
    /// transaction.
    pub blob_transaction_sidecar: BlobTransactionSidecar,
    /// Number of the block the transaction was included in.
    pub block_number: u64,
    /// Hash of the block the transaction was included in.
    pub block_hash: B256,
    /// Index of the transaction within the block body.
    pub tx_index: u64,
    /// Hash of the transaction that carried this sidecar.
    pub tx_hash: B256,
}

impl Encodable for BlobSidecar {
    fn encode(&self, out: &mut dyn bytes::BufMut) {
        let header = alloy_rlp::Header {
            list: true,
            payload_length: self.blob_transaction_sidecar.length()
                + self.block_number.length()
                + self.block_hash.length()
                + self.tx_index.length()
                + self.tx_hash.length(),
        };
        header.encode(out);
        self.blob_transaction_sidecar.encode(out);
        self.block_number.encode(out);
        self.block_hash.encode(out);
        self.tx_index.encode(out);
        self.tx_hash.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.blob_transaction_sidecar.length()
            + self.block_number.length()
            + self.block_hash.length()
            + self.tx_index.length()
            + self.tx_hash.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for BlobSidecar {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let _header = alloy_rlp::Header::decode(buf)?;
        Ok(Self {
            blob_transaction_sidecar: Decodable::decode(buf)?,
            block_number: Decodable::decode(buf)?,
            block_hash: Decodable::decode(buf)?,
            tx_index: Decodable::decode(buf)?,
            tx_hash: Decodable::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_sidecar_rlp_roundtrip() {
        let sidecar = BlobSidecar {
            blob_transaction_sidecar: BlobTransactionSidecar {
                blobs: vec![],
                commitments: vec![Default::default()],
                proofs: vec![Default::default()],
            },
            block_number: 17,
            block_hash: B256::repeat_byte(0x11),
            tx_index: 3,
            tx_hash: B256::repeat_byte(0x22),
        };

        let mut encoded = Vec::new();
        sidecar.encode(&mut encoded);
        let decoded = BlobSidecar::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(sidecar, decoded);
    }
}
