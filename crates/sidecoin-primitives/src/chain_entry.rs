//! Chain index entries.
//!
//! Unlike general proof-of-work chains the chainwork is not persisted with
//! the entry: with a fixed network target the cumulative work at any height
//! is `proof * (height + 1)`, so it is recomputed on load instead of being
//! trusted from storage.

use crate::header::{Header, HEADER_SIZE};
use crate::pow::{self, ChainWork};
use crate::{DecodeError, Params, SideBlockHash};
use bitcoin::hashes::Hash;

/// Serialized entry size: the 136-byte header followed by the height.
pub const ENTRY_SIZE: usize = 140;

/// Errors constructing a chain entry from a header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// The header does not link the parent it was offered.
    #[error("header links {got}, expected parent {expected}")]
    PrevBlockMismatch {
        expected: SideBlockHash,
        got: SideBlockHash,
    },
    /// A genesis header must link the all-zero hash.
    #[error("genesis header must link the zero hash")]
    NonZeroGenesisPrev,
    /// The parent height leaves no room for a child.
    #[error("parent height {0} leaves no room for a child")]
    HeightOverflow(u32),
}

/// An entry in the chain index.
///
/// Created when a block is accepted by its parent and never mutated
/// afterwards; the index retains every entry forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// The block's header fields.
    pub header: Header,
    /// Height in the chain; zero only for genesis.
    pub height: u32,
    /// Sum of per-block proofs from genesis to this entry.
    pub chainwork: ChainWork,
}

impl ChainEntry {
    /// Builds the entry extending `prev` (or genesis when `prev` is absent).
    pub fn from_header(
        header: Header,
        prev: Option<&ChainEntry>,
        params: &Params,
    ) -> Result<Self, HeaderError> {
        let height = match prev {
            Some(parent) => {
                let parent_hash = parent.hash();
                if header.prev_block != parent_hash {
                    return Err(HeaderError::PrevBlockMismatch {
                        expected: parent_hash,
                        got: header.prev_block,
                    });
                }
                parent
                    .height
                    .checked_add(1)
                    .ok_or(HeaderError::HeightOverflow(parent.height))?
            }
            None => {
                if header.prev_block != SideBlockHash::all_zeros() {
                    return Err(HeaderError::NonZeroGenesisPrev);
                }
                0
            }
        };

        let mut entry = Self {
            header,
            height,
            chainwork: ChainWork::zero(),
        };
        entry.chainwork = entry.compute_chainwork(prev, params);

        Ok(entry)
    }

    /// The network's genesis entry.
    pub fn genesis(params: &Params) -> Self {
        Self::from_header(params.genesis_header(), None, params)
            .expect("network genesis header links the zero hash; qed")
    }

    /// Per-block proof under the network's fixed compact target.
    pub fn compute_proof(&self, params: &Params) -> ChainWork {
        pow::proof_from_bits(params.pow_bits)
    }

    /// Proof of this entry plus the parent's accumulated chainwork.
    pub fn compute_chainwork(&self, prev: Option<&ChainEntry>, params: &Params) -> ChainWork {
        let proof = self.compute_proof(params);
        match prev {
            Some(parent) => proof + &parent.chainwork,
            None => proof,
        }
    }

    /// Whether this is the genesis entry.
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// The block identity hash, recomputed from the header bytes.
    pub fn hash(&self) -> SideBlockHash {
        self.header.block_hash()
    }

    /// Tests a versionbits signalling bit on the entry's version field.
    pub fn has_version_bit(&self, bit: u8) -> bool {
        self.header.has_version_bit(bit)
    }

    /// Serializes the entry to its fixed 140-byte index record.
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[..HEADER_SIZE].copy_from_slice(&self.header.encode());
        raw[HEADER_SIZE..].copy_from_slice(&self.height.to_le_bytes());
        raw
    }

    /// Parses an entry from exactly [`ENTRY_SIZE`] bytes.
    ///
    /// The content hash is derived from the bytes on demand, never read back
    /// from storage; chainwork is recomputed from the height and the fixed
    /// network target.
    pub fn decode(data: &[u8], params: &Params) -> Result<Self, DecodeError> {
        if data.len() != ENTRY_SIZE {
            return Err(DecodeError::BadLength {
                expected: ENTRY_SIZE,
                got: data.len(),
            });
        }

        let header = Header::decode_fields(&data[..HEADER_SIZE]);
        let height = u32::from_le_bytes(
            data[HEADER_SIZE..ENTRY_SIZE]
                .try_into()
                .expect("4 bytes; qed"),
        );

        Ok(Self {
            header,
            height,
            chainwork: pow::chainwork_at(params.pow_bits, height),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BundleHash, Network};
    use bitcoin::{BlockHash, TxMerkleNode};

    fn params() -> Params {
        Params::new(Network::Main)
    }

    fn child_header(parent: &ChainEntry) -> Header {
        Header {
            version: 1,
            prev_block: parent.hash(),
            merkle_root: TxMerkleNode::from_byte_array([0xab; 32]),
            withdrawal_bundle: BundleHash::all_zeros(),
            mainchain_block: BlockHash::from_byte_array([0xcd; 32]),
            time: parent.header.time + 600,
        }
    }

    #[test]
    fn genesis_chainwork_equals_its_proof() {
        let params = params();
        let genesis = ChainEntry::genesis(&params);

        assert!(genesis.is_genesis());
        assert_eq!(genesis.height, 0);
        assert!(!genesis.compute_proof(&params).is_zero());
        assert_eq!(genesis.chainwork, genesis.compute_chainwork(None, &params));
        assert_eq!(genesis.chainwork, genesis.compute_proof(&params));
    }

    #[test]
    fn child_adds_one_proof_to_parent_chainwork() {
        let params = params();
        let mut parent = ChainEntry::genesis(&params);

        // Extend to height 10, then check the height-11 child.
        for _ in 0..10 {
            let header = child_header(&parent);
            parent = ChainEntry::from_header(header, Some(&parent), &params).unwrap();
        }
        assert_eq!(parent.height, 10);

        let child =
            ChainEntry::from_header(child_header(&parent), Some(&parent), &params).unwrap();
        assert_eq!(child.height, 11);
        assert_eq!(
            child.chainwork,
            child.compute_proof(&params) + &parent.chainwork
        );
    }

    #[test]
    fn from_header_rejects_broken_parent_links() {
        let params = params();
        let genesis = ChainEntry::genesis(&params);

        let mut header = child_header(&genesis);
        header.prev_block = SideBlockHash::from_byte_array([0x99; 32]);
        assert!(matches!(
            ChainEntry::from_header(header, Some(&genesis), &params),
            Err(HeaderError::PrevBlockMismatch { .. })
        ));

        // A genesis candidate with a non-zero link is rejected as well.
        assert_eq!(
            ChainEntry::from_header(header, None, &params),
            Err(HeaderError::NonZeroGenesisPrev)
        );
    }

    #[test]
    fn encode_decode_round_trip() {
        let params = params();
        let genesis = ChainEntry::genesis(&params);
        let child =
            ChainEntry::from_header(child_header(&genesis), Some(&genesis), &params).unwrap();

        let raw = child.encode();
        assert_eq!(raw.len(), ENTRY_SIZE);

        let decoded = ChainEntry::decode(&raw, &params).unwrap();
        assert_eq!(decoded.header, child.header);
        assert_eq!(decoded.height, child.height);
        assert_eq!(decoded.chainwork, child.chainwork);
        assert_eq!(decoded.hash(), child.hash());
    }

    #[test]
    fn decode_rejects_truncated_records() {
        let params = params();
        let raw = ChainEntry::genesis(&params).encode();

        assert_eq!(
            ChainEntry::decode(&raw[..ENTRY_SIZE - 1], &params),
            Err(DecodeError::BadLength {
                expected: ENTRY_SIZE,
                got: ENTRY_SIZE - 1,
            })
        );
    }
}
