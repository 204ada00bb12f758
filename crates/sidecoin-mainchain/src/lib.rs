//! Mainchain RPC client contract.
//!
//! The peg state machines depend on the mainchain for finality: bundle
//! acknowledgement counts, spent/failed withdrawal status and deposit
//! verification. This crate specifies only the call contract; transport and
//! authentication are opaque to the consensus core.

use bitcoin::{BlockHash, OutPoint, Txid};
use sidecoin_primitives::{BundleHash, SideBlockHash};

/// Failure of a mainchain call.
///
/// Every variant is a definite failure of the dependent validation step.
/// There is no implicit "pending" state and no internal retry; callers
/// retry or escalate explicitly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The transport failed before a response arrived.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The mainchain daemon returned an RPC-level error.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },
    /// The caller-imposed deadline expired.
    #[error("mainchain call timed out")]
    Timeout,
    /// The response did not match the call contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for mainchain calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// The mainchain RPC surface consumed by the peg state machines.
///
/// Calls block until the mainchain responds. Implementations wrap an actual
/// RPC transport; callers that must bound latency apply their own timeout
/// and treat expiry as [`ClientError::Timeout`].
pub trait MainchainClient {
    /// Announces a created withdrawal bundle to the mainchain.
    fn broadcast_withdrawal_bundle(&self, sidechain: u8, bundle: &BundleHash) -> Result<()>;

    /// Checks a blind-merge-mining commitment inside a mainchain block.
    fn verify_bmm(
        &self,
        main_block: &BlockHash,
        bmm_hash: &SideBlockHash,
        sidechain: u8,
    ) -> Result<bool>;

    /// Number of blocks on the mainchain.
    fn get_block_count(&self) -> Result<u64>;

    /// The sidechain's current critical-transaction index pair, if any.
    fn get_sidechain_tip(&self, sidechain: u8) -> Result<Option<OutPoint>>;

    /// Whether the bundle hash is recorded as spent on the mainchain.
    fn has_spent_withdrawal(&self, bundle: &BundleHash, sidechain: u8) -> Result<bool>;

    /// Whether the bundle hash is recorded as failed on the mainchain.
    fn has_failed_withdrawal(&self, bundle: &BundleHash, sidechain: u8) -> Result<bool>;

    /// Acknowledgement count for a bundle, `None` while the mainchain does
    /// not know the hash.
    fn get_work_score(&self, sidechain: u8, bundle: &BundleHash) -> Result<Option<u32>>;

    /// Verifies that a deposit transaction exists in the given mainchain
    /// block and matches the claimed position.
    fn verify_deposit(&self, main_block: &BlockHash, txid: &Txid, tx_index: u32) -> Result<bool>;
}
