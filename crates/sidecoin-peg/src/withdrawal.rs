//! Peg-out requests.

use crate::StateError;
use bitcoin::consensus::encode::{self, Decodable, Encodable};
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::{io, Amount, ScriptBuf};
use sidecoin_primitives::BlindTxid;
use std::cmp::Ordering;
use std::fmt;

/// Lifecycle status of a withdrawal.
///
/// `Unknown` is the uninitialized sentinel; it is never re-entered once a
/// request exists. The remaining statuses only move forward, except for the
/// explicit bundle-failure cascade which releases `Pending` back to
/// `Unspent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WithdrawalStatus {
    Unknown = 0x00,
    Unspent = 0x01,
    Pending = 0x02,
    Spent = 0x03,
}

impl WithdrawalStatus {
    /// The status tag byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a status tag; out-of-range bytes are rejected.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Unknown),
            0x01 => Some(Self::Unspent),
            0x02 => Some(Self::Pending),
            0x03 => Some(Self::Spent),
            _ => None,
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Unspent => "unspent",
            Self::Pending => "pending",
            Self::Spent => "spent",
        };
        f.write_str(name)
    }
}

/// A single peg-out request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// Sidechain slot the request belongs to.
    pub sidechain: u8,
    /// Mainchain script the withdrawn value pays to.
    pub destination: ScriptBuf,
    /// Sidechain script refunded if the peg-out is abandoned.
    pub refund_script: ScriptBuf,
    /// Withdrawn value.
    pub amount: Amount,
    /// Fee offered to mainchain miners; bumping it does not change the
    /// request's identity.
    pub mainchain_fee: Amount,
    /// Hash of the spend transaction excluding its outputs.
    pub blind_txid: BlindTxid,
    status: WithdrawalStatus,
}

impl Withdrawal {
    /// Creates a fresh, unspent request.
    pub fn new(
        sidechain: u8,
        destination: ScriptBuf,
        refund_script: ScriptBuf,
        amount: Amount,
        mainchain_fee: Amount,
        blind_txid: BlindTxid,
    ) -> Self {
        Self {
            sidechain,
            destination,
            refund_script,
            amount,
            mainchain_fee,
            blind_txid,
            status: WithdrawalStatus::Unspent,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> WithdrawalStatus {
        self.status
    }

    /// Whether the request is eligible for bundle selection.
    pub fn is_unspent(&self) -> bool {
        self.status == WithdrawalStatus::Unspent
    }

    /// Whether the request sits in the active bundle.
    pub fn is_pending(&self) -> bool {
        self.status == WithdrawalStatus::Pending
    }

    /// Whether the request has been finalized on the mainchain.
    pub fn is_spent(&self) -> bool {
        self.status == WithdrawalStatus::Spent
    }

    /// `Unspent -> Pending`: the request was selected into a bundle.
    pub fn select_into_bundle(&mut self) -> Result<(), StateError> {
        self.step(WithdrawalStatus::Unspent, WithdrawalStatus::Pending)
    }

    /// `Pending -> Spent`: the containing bundle was finalized.
    pub fn mark_spent(&mut self) -> Result<(), StateError> {
        self.step(WithdrawalStatus::Pending, WithdrawalStatus::Spent)
    }

    /// `Pending -> Unspent`: the containing bundle failed, making the
    /// request eligible for re-selection.
    pub fn release_from_bundle(&mut self) -> Result<(), StateError> {
        self.step(WithdrawalStatus::Pending, WithdrawalStatus::Unspent)
    }

    fn step(&mut self, from: WithdrawalStatus, to: WithdrawalStatus) -> Result<(), StateError> {
        if self.status != from {
            return Err(StateError::Withdrawal {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Total order used for bundle selection: higher mainchain fees first.
    ///
    /// Equal fees compare equal, so a stable sort preserves insertion order
    /// and bundle contents are deterministic across implementations.
    pub fn compare_mainchain_fee(a: &Withdrawal, b: &Withdrawal) -> Ordering {
        b.mainchain_fee.cmp(&a.mainchain_fee)
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

impl Encodable for Withdrawal {
    fn consensus_encode<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = 0;
        len += self.status.as_u8().consensus_encode(w)?;
        len += self.sidechain.consensus_encode(w)?;
        len += self.blind_txid.to_raw_hash().consensus_encode(w)?;
        len += self.amount.to_sat().consensus_encode(w)?;
        len += self.mainchain_fee.to_sat().consensus_encode(w)?;
        len += self.destination.consensus_encode(w)?;
        len += self.refund_script.consensus_encode(w)?;
        Ok(len)
    }
}

impl Decodable for Withdrawal {
    fn consensus_decode<R: io::BufRead + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let status = WithdrawalStatus::from_u8(u8::consensus_decode(r)?)
            .ok_or(encode::Error::ParseFailed("withdrawal status out of range"))?;
        let sidechain = u8::consensus_decode(r)?;
        let blind_txid = BlindTxid::from_raw_hash(Decodable::consensus_decode(r)?);
        let amount = Amount::from_sat(u64::consensus_decode(r)?);
        let mainchain_fee = Amount::from_sat(u64::consensus_decode(r)?);
        let destination = ScriptBuf::consensus_decode(r)?;
        let refund_script = ScriptBuf::consensus_decode(r)?;

        Ok(Self {
            sidechain,
            destination,
            refund_script,
            amount,
            mainchain_fee,
            blind_txid,
            status,
        })
    }
}
