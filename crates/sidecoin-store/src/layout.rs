//! Key layout of the sidechain database.
//!
//! Database layout:
//!   z[hash] -> unspent withdrawal
//!   i[hash] -> pending withdrawal (selected into the active bundle)
//!   s[hash] -> spent withdrawal
//!   f[hash] -> refunded withdrawal
//!   Z[hash] -> created withdrawal bundle marker
//!   F[hash] -> failed withdrawal bundle marker
//!   S[hash] -> spent withdrawal bundle marker
//!   B[hash] -> withdrawal bundle record
//!   L[hash] -> latest sidechain deposit hash
//!   W[hash] -> latest withdrawal bundle outpoint
//!   w[hash][index] -> withdrawal outpoint
//!   d[hash][index] -> deposit outpoint
//!   V -> db schema version
//!   O -> chain options
//!   R -> tip hash
//!   D -> versionbits deployment table
//!   e[hash] -> chain entry
//!   h[hash] -> height
//!   H[height] -> hash
//!   n[hash] -> next hash
//!   v[bit][hash] -> versionbits state
//!
//! Keys are injective per namespace. Multi-byte integers inside keys are
//! big-endian so lexicographic iteration follows numeric order.

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::Txid;
use sidecoin_primitives::{BlindTxid, BundleHash, SideBlockHash};

/// Withdrawal status zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalZone {
    /// Eligible for selection into a bundle.
    Unspent,
    /// Selected into the active bundle.
    Pending,
    /// Finalized by a spent bundle.
    Spent,
    /// Refunded after its peg-out was abandoned.
    Refunded,
}

impl WithdrawalZone {
    /// The zone's namespace byte.
    pub fn prefix(self) -> [u8; 1] {
        match self {
            WithdrawalZone::Unspent => *b"z",
            WithdrawalZone::Pending => *b"i",
            WithdrawalZone::Spent => *b"s",
            WithdrawalZone::Refunded => *b"f",
        }
    }

    /// Key of a withdrawal record within this zone.
    pub fn key(self, id: &BlindTxid) -> [u8; 33] {
        prefixed_hash(self.prefix()[0], id.as_byte_array())
    }
}

/// Bundle status zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleZone {
    Created,
    Failed,
    Spent,
}

impl BundleZone {
    /// The zone's namespace byte.
    pub fn prefix(self) -> [u8; 1] {
        match self {
            BundleZone::Created => *b"Z",
            BundleZone::Failed => *b"F",
            BundleZone::Spent => *b"S",
        }
    }

    /// Key of a bundle marker within this zone.
    pub fn key(self, hash: &BundleHash) -> [u8; 33] {
        prefixed_hash(self.prefix()[0], hash.as_byte_array())
    }
}

/// `B[hash]` -> withdrawal bundle record.
pub fn bundle_record(hash: &BundleHash) -> [u8; 33] {
    prefixed_hash(b'B', hash.as_byte_array())
}

/// `L[hash]` -> latest sidechain deposit hash, keyed by the sidechain's
/// deposit script hash.
pub fn latest_deposit(script_hash: &sha256d::Hash) -> [u8; 33] {
    prefixed_hash(b'L', script_hash.as_byte_array())
}

/// `W[hash]` -> latest withdrawal bundle outpoint, keyed by the sidechain's
/// deposit script hash.
pub fn latest_bundle(script_hash: &sha256d::Hash) -> [u8; 33] {
    prefixed_hash(b'W', script_hash.as_byte_array())
}

/// `w[hash][index]` -> withdrawal outpoint.
pub fn withdrawal_outpoint(id: &BlindTxid, index: u32) -> [u8; 37] {
    prefixed_hash_index(b'w', id.as_byte_array(), index)
}

/// `d[hash][index]` -> deposit outpoint.
pub fn deposit_outpoint(txid: &Txid, index: u32) -> [u8; 37] {
    prefixed_hash_index(b'd', txid.as_byte_array(), index)
}

/// `V` -> db schema version.
pub const fn version() -> [u8; 1] {
    *b"V"
}

/// `O` -> chain options.
pub const fn options() -> [u8; 1] {
    *b"O"
}

/// `R` -> tip hash.
pub const fn tip() -> [u8; 1] {
    *b"R"
}

/// `D` -> versionbits deployment table.
pub const fn deployments() -> [u8; 1] {
    *b"D"
}

/// `e[hash]` -> chain entry record.
pub fn entry(hash: &SideBlockHash) -> [u8; 33] {
    prefixed_hash(b'e', hash.as_byte_array())
}

/// `h[hash]` -> height.
pub fn height_index(hash: &SideBlockHash) -> [u8; 33] {
    prefixed_hash(b'h', hash.as_byte_array())
}

/// `H[height]` -> hash.
pub fn hash_index(height: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = b'H';
    key[1..].copy_from_slice(&height.to_be_bytes());
    key
}

/// `n[hash]` -> next hash.
pub fn next_hash(hash: &SideBlockHash) -> [u8; 33] {
    prefixed_hash(b'n', hash.as_byte_array())
}

/// `v[bit][hash]` -> versionbits state.
pub fn versionbits_state(bit: u8, hash: &SideBlockHash) -> [u8; 34] {
    let mut key = [0u8; 34];
    key[0] = b'v';
    key[1] = bit;
    key[2..].copy_from_slice(hash.as_byte_array());
    key
}

fn prefixed_hash(ns: u8, hash: &[u8; 32]) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = ns;
    key[1..].copy_from_slice(hash);
    key
}

fn prefixed_hash_index(ns: u8, hash: &[u8; 32], index: u32) -> [u8; 37] {
    let mut key = [0u8; 37];
    key[0] = ns;
    key[1..33].copy_from_slice(hash);
    key[33..].copy_from_slice(&index.to_be_bytes());
    key
}
