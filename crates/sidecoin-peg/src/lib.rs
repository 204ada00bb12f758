//! Two-way peg entities and their lifecycle state machines.
//!
//! Deposits (peg-ins), withdrawals (peg-outs) and withdrawal bundles are
//! plain data with typed status transitions; the [`PegManager`] composes
//! them with the persistent layout and the mainchain client contract, and
//! is the only component that moves records across status zones.

mod bundle;
mod deposit;
mod error;
mod manager;
mod selection;
mod withdrawal;

pub use bundle::{BundleStatus, WithdrawalBundle, MAX_BUNDLE_MEMBERS};
pub use deposit::Deposit;
pub use error::{PegError, StateError};
pub use manager::PegManager;
pub use selection::{aggregate_transaction, select_withdrawals};
pub use withdrawal::{Withdrawal, WithdrawalStatus};

/// Result type for peg operations.
pub type Result<T> = std::result::Result<T, PegError>;

/// A peg entity record, tagged by kind.
///
/// The common view over the concrete entities: every record belongs to a
/// sidechain slot, and the closed set of kinds makes dispatch a match
/// instead of a vtable.
#[derive(Debug, Clone)]
pub enum PegRecord {
    /// A peg-in.
    Deposit(Deposit),
    /// A single peg-out request.
    Withdrawal(Withdrawal),
    /// An aggregation of peg-outs.
    Bundle(WithdrawalBundle),
}

impl PegRecord {
    /// The sidechain slot the record belongs to.
    pub fn sidechain(&self) -> u8 {
        match self {
            PegRecord::Deposit(d) => d.sidechain,
            PegRecord::Withdrawal(w) => w.sidechain,
            PegRecord::Bundle(b) => b.sidechain,
        }
    }
}
