//! Error types for the peg lifecycle.

use crate::{BundleStatus, WithdrawalStatus};
use bitcoin::Txid;
use sidecoin_mainchain::ClientError;
use sidecoin_primitives::BlindTxid;

/// An attempted state transition the lifecycle does not allow.
///
/// Statuses only move forward; a violation names the offending states
/// instead of being silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Withdrawal statuses move `Unspent -> Pending -> Spent` only.
    #[error("withdrawal cannot move from {from} to {to}")]
    Withdrawal {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    /// Bundle statuses move `Created -> Spent` or `Created -> Failed` only.
    #[error("withdrawal bundle cannot move from {from} to {to}")]
    Bundle { from: BundleStatus, to: BundleStatus },

    /// At most one bundle may be `Created` per sidechain at a time.
    #[error("a withdrawal bundle is already active")]
    BundleAlreadyActive,
}

/// Errors from peg operations.
#[derive(Debug, thiserror::Error)]
pub enum PegError {
    /// Persistent layout failure.
    #[error("store error: {0}")]
    Store(#[from] sidecoin_store::Error),

    /// A stored peg record failed to decode; the record is corrupt, not
    /// defaulted.
    #[error("record decode error: {0}")]
    Decode(#[from] bitcoin::consensus::encode::Error),

    /// Lifecycle violation.
    #[error(transparent)]
    State(#[from] StateError),

    /// The mainchain client reported a definite failure of the dependent
    /// validation step.
    #[error("mainchain client: {0}")]
    Mainchain(#[from] ClientError),

    /// No unspent withdrawals are eligible for a bundle.
    #[error("no unspent withdrawals eligible for a bundle")]
    NoEligibleWithdrawals,

    /// The mainchain rejected the claimed deposit.
    #[error("deposit {0} was rejected by the mainchain")]
    DepositRejected(Txid),

    /// The withdrawal is not in the status zone the operation requires.
    #[error("withdrawal {0} not found in the expected status zone")]
    WithdrawalNotFound(BlindTxid),

    /// The deposit outpoint is unknown.
    #[error("deposit {txid}:{index} not found")]
    DepositNotFound { txid: Txid, index: u32 },

    /// Stored peg state contradicts itself.
    #[error("corrupt peg state: {0}")]
    Corrupt(String),
}
