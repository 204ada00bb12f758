//! Fixed-layout block header shared by all block-like objects.

use crate::{hash256, BundleHash, DecodeError, SideBlockHash};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, TxMerkleNode};

/// Serialized header size: a version word, four 32-byte hashes and a
/// timestamp. No difficulty bits and no nonce are carried; the target is a
/// fixed network constant and the proof lives in the mainchain commitment.
pub const HEADER_SIZE: usize = 136;

/// Top three version bits required for versionbits signalling.
pub const VERSION_TOP_BITS: u32 = 0x2000_0000;

/// Mask covering the top three version bits.
pub const VERSION_TOP_MASK: u32 = 0xe000_0000;

/// Block header fields.
///
/// The content hash is always recomputed from the serialized bytes; it is
/// never stored alongside the fields, so a stale hash can never diverge from
/// the data it claims to commit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Block version, also used for versionbits signalling.
    pub version: u32,
    /// Hash of the previous sidechain block.
    pub prev_block: SideBlockHash,
    /// Merkle root of the block's transactions.
    pub merkle_root: TxMerkleNode,
    /// Commitment to the withdrawal bundle active at this block.
    pub withdrawal_bundle: BundleHash,
    /// Mainchain block this sidechain block is anchored to.
    pub mainchain_block: BlockHash,
    /// Block timestamp.
    pub time: u32,
}

impl Header {
    /// Serializes the header into its fixed 136-byte layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..36].copy_from_slice(self.prev_block.as_byte_array());
        raw[36..68].copy_from_slice(self.merkle_root.as_byte_array());
        raw[68..100].copy_from_slice(self.withdrawal_bundle.as_byte_array());
        raw[100..132].copy_from_slice(self.mainchain_block.as_byte_array());
        raw[132..136].copy_from_slice(&self.time.to_le_bytes());
        raw
    }

    /// Parses a header from exactly [`HEADER_SIZE`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() != HEADER_SIZE {
            return Err(DecodeError::BadLength {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        Ok(Self::decode_fields(data))
    }

    /// Parses header fields from a buffer already known to be long enough.
    pub(crate) fn decode_fields(raw: &[u8]) -> Self {
        let hash32 = |range: std::ops::Range<usize>| -> [u8; 32] {
            raw[range].try_into().expect("range is 32 bytes; qed")
        };

        Self {
            version: u32::from_le_bytes(raw[0..4].try_into().expect("4 bytes; qed")),
            prev_block: SideBlockHash::from_byte_array(hash32(4..36)),
            merkle_root: TxMerkleNode::from_byte_array(hash32(36..68)),
            withdrawal_bundle: BundleHash::from_byte_array(hash32(68..100)),
            mainchain_block: BlockHash::from_byte_array(hash32(100..132)),
            time: u32::from_le_bytes(raw[132..136].try_into().expect("4 bytes; qed")),
        }
    }

    /// Content hash: double-SHA256 of the serialized header.
    pub fn block_hash(&self) -> SideBlockHash {
        SideBlockHash::from_byte_array(hash256(&self.encode()))
    }

    /// Tests a versionbits signalling bit.
    ///
    /// True only when the version carries the versionbits top bits and the
    /// requested bit is within the signalling range.
    pub fn has_version_bit(&self, bit: u8) -> bool {
        bit < 29
            && (self.version & VERSION_TOP_MASK) == VERSION_TOP_BITS
            && (self.version & (1 << bit)) != 0
    }
}
