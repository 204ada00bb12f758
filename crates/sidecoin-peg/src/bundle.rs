//! Withdrawal bundles: peg-outs aggregated into one mainchain transaction.

use crate::StateError;
use bitcoin::consensus::encode::{self, Decodable, Encodable, VarInt};
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::{io, Transaction};
use sidecoin_primitives::{hash256, BlindTxid, BundleHash};
use std::cmp::Ordering;
use std::fmt;

/// Upper bound on withdrawals aggregated into one bundle, keeping the
/// mainchain transaction within standard size.
pub const MAX_BUNDLE_MEMBERS: usize = 100;

/// Lifecycle status of a withdrawal bundle.
///
/// A bundle is born `Created` and terminates in `Spent` (the mainchain
/// acknowledged it before the deadline) or `Failed` (the deadline elapsed).
/// Terminal bundles are retained for audit and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BundleStatus {
    Unknown = 0x00,
    Failed = 0x01,
    Created = 0x02,
    Spent = 0x03,
}

impl BundleStatus {
    /// The status tag byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a status tag; out-of-range bytes are rejected.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Unknown),
            0x01 => Some(Self::Failed),
            0x02 => Some(Self::Created),
            0x03 => Some(Self::Spent),
            _ => None,
        }
    }
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Failed => "failed",
            Self::Created => "created",
            Self::Spent => "spent",
        };
        f.write_str(name)
    }
}

/// An aggregation of withdrawals submitted to the mainchain as one
/// transaction.
///
/// The bundle holds value-copies of its members' blind-tx hashes, not
/// back-references; the member withdrawals live in their own status zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalBundle {
    /// Sidechain slot the bundle belongs to.
    pub sidechain: u8,
    /// The aggregated mainchain-spendable transaction.
    pub tx: Transaction,
    /// Sidechain height the bundle was created at.
    pub height: u32,
    /// Height past which an unacknowledged bundle fails.
    pub failed_height: u32,
    status: BundleStatus,
    members: Vec<BlindTxid>,
}

impl WithdrawalBundle {
    /// Creates a bundle in the `Created` state.
    pub fn new(
        sidechain: u8,
        tx: Transaction,
        members: Vec<BlindTxid>,
        height: u32,
        failed_height: u32,
    ) -> Self {
        Self {
            sidechain,
            tx,
            height,
            failed_height,
            status: BundleStatus::Created,
            members,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> BundleStatus {
        self.status
    }

    /// Whether the bundle is awaiting mainchain acknowledgement.
    pub fn is_created(&self) -> bool {
        self.status == BundleStatus::Created
    }

    /// Whether the bundle was finalized on the mainchain.
    pub fn is_spent(&self) -> bool {
        self.status == BundleStatus::Spent
    }

    /// Whether the bundle missed its deadline.
    pub fn is_failed(&self) -> bool {
        self.status == BundleStatus::Failed
    }

    /// Blind-tx hashes of the member withdrawals.
    pub fn members(&self) -> &[BlindTxid] {
        &self.members
    }

    /// Commitment hash of the aggregated transaction.
    pub fn bundle_hash(&self) -> BundleHash {
        BundleHash::from_byte_array(self.tx.compute_txid().to_byte_array())
    }

    /// Identifier of the member set: a hash over the ordered member
    /// blind-tx hashes.
    pub fn withdrawal_id(&self) -> sha256d::Hash {
        let mut data = Vec::with_capacity(self.members.len() * 32);
        for member in &self.members {
            data.extend_from_slice(member.as_byte_array());
        }
        sha256d::Hash::from_byte_array(hash256(&data))
    }

    /// `Created -> Spent`: the mainchain acknowledged the bundle before the
    /// deadline.
    pub fn mark_spent(&mut self) -> Result<(), StateError> {
        self.step(BundleStatus::Spent)
    }

    /// `Created -> Failed`: the deadline elapsed without acknowledgement.
    pub fn mark_failed(&mut self) -> Result<(), StateError> {
        self.step(BundleStatus::Failed)
    }

    fn step(&mut self, to: BundleStatus) -> Result<(), StateError> {
        if self.status != BundleStatus::Created {
            return Err(StateError::Bundle {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Orders bundles by creation height, ascending.
    pub fn compare_by_height(a: &WithdrawalBundle, b: &WithdrawalBundle) -> Ordering {
        a.height.cmp(&b.height)
    }

    /// Serializes the record.
    pub fn encode(&self) -> Vec<u8> {
        serialize(self)
    }

    /// Parses a record, rejecting trailing bytes and unknown status tags.
    pub fn decode(data: &[u8]) -> Result<Self, encode::Error> {
        deserialize(data)
    }
}

impl Encodable for WithdrawalBundle {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = 0;
        len += self.status.as_u8().consensus_encode(w)?;
        len += self.sidechain.consensus_encode(w)?;
        len += self.height.consensus_encode(w)?;
        len += self.failed_height.consensus_encode(w)?;
        len += self.tx.consensus_encode(w)?;
        len += VarInt(self.members.len() as u64).consensus_encode(w)?;
        for member in &self.members {
            len += member.to_raw_hash().consensus_encode(w)?;
        }
        Ok(len)
    }
}

impl Decodable for WithdrawalBundle {
    fn consensus_decode<R: io::BufRead + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let status = BundleStatus::from_u8(u8::consensus_decode(r)?)
            .ok_or(encode::Error::ParseFailed("bundle status out of range"))?;
        let sidechain = u8::consensus_decode(r)?;
        let height = u32::consensus_decode(r)?;
        let failed_height = u32::consensus_decode(r)?;
        let tx = Transaction::consensus_decode(r)?;

        let VarInt(count) = VarInt::consensus_decode(r)?;
        if count > MAX_BUNDLE_MEMBERS as u64 {
            return Err(encode::Error::ParseFailed("bundle member list too long"));
        }
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            members.push(BlindTxid::from_raw_hash(Decodable::consensus_decode(r)?));
        }

        Ok(Self {
            sidechain,
            tx,
            height,
            failed_height,
            status,
            members,
        })
    }
}
