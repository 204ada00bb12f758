//! Bundle member selection and aggregation.

use crate::Withdrawal;
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

/// Selects the withdrawals for the next bundle.
///
/// Mirrors fee-priority block construction: higher mainchain fees are
/// preferred while capacity lasts. The sort is stable, so equal fees keep
/// the insertion order of `candidates` and the selected set is
/// deterministic across implementations.
pub fn select_withdrawals(mut candidates: Vec<Withdrawal>, limit: usize) -> Vec<Withdrawal> {
    candidates.sort_by(Withdrawal::compare_mainchain_fee);
    candidates.truncate(limit);
    candidates
}

/// Builds the aggregated mainchain transaction for the selected members.
///
/// One output per withdrawal, in selection order. The single null-outpoint
/// input is a placeholder for the sidechain's ctip, which the mainchain
/// wallet rewires when funding the bundle.
pub fn aggregate_transaction(members: &[Withdrawal]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: members
            .iter()
            .map(|w| TxOut {
                value: w.amount,
                script_pubkey: w.destination.clone(),
            })
            .collect(),
    }
}
