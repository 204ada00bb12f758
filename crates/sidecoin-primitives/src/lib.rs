//! Consensus primitives for the sidecoin sidechain.
//!
//! This crate defines the data that every node must agree on bit-for-bit:
//! the fixed-layout block header, the chain-index entry with cumulative
//! chainwork, the proof arithmetic for the network's fixed target, and the
//! per-network parameter tables.

pub mod chain_entry;
pub mod header;
pub mod params;
pub mod pow;

use bitcoin::hashes::sha256d;

bitcoin::hashes::hash_newtype! {
    /// Identity hash of a sidechain block: double-SHA256 of the 136-byte
    /// serialized header.
    pub struct SideBlockHash(sha256d::Hash);

    /// Commitment hash of a withdrawal bundle.
    pub struct BundleHash(sha256d::Hash);

    /// Hash of a withdrawal's spend transaction with its outputs excluded.
    ///
    /// Identifies a peg-out request independently of its mainchain fee, so
    /// the fee can be adjusted without changing the request's identity.
    pub struct BlindTxid(sha256d::Hash);
}

pub use chain_entry::{ChainEntry, HeaderError, ENTRY_SIZE};
pub use header::{Header, HEADER_SIZE, VERSION_TOP_BITS, VERSION_TOP_MASK};
pub use params::{Deployment, Network, Params, ThresholdState};
pub use pow::ChainWork;

/// Errors from decoding fixed-layout records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Record length does not match the fixed layout.
    #[error("bad record length: expected {expected} bytes, got {got}")]
    BadLength { expected: usize, got: usize },
}

/// Double-SHA256 of `data`.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let once = Sha256::digest(data);
    let twice = Sha256::digest(once.as_slice());
    let mut out = [0u8; 32];
    out.copy_from_slice(twice.as_slice());
    out
}
