//! Peg lifecycle orchestration.
//!
//! The entities in this crate are plain data; everything that needs the
//! persistent layout or the mainchain client lives here. The manager is the
//! single writer for peg state: it re-keys records across status zones and
//! applies each lifecycle step as one atomic batch.

use crate::selection::{aggregate_transaction, select_withdrawals};
use crate::{
    BundleStatus, Deposit, PegError, Result, StateError, Withdrawal, WithdrawalBundle,
    MAX_BUNDLE_MEMBERS,
};
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::{OutPoint, ScriptBuf, Txid};
use parking_lot::Mutex;
use sidecoin_mainchain::MainchainClient;
use sidecoin_primitives::{hash256, BlindTxid, BundleHash, Params};
use sidecoin_store::layout::{self, BundleZone, WithdrawalZone};
use sidecoin_store::{Batch, ChainDb};
use std::sync::Arc;

/// Orchestrates deposits, withdrawals and bundles against the store and the
/// mainchain client.
pub struct PegManager<C> {
    db: Arc<ChainDb>,
    client: C,
    params: Params,
    sidechain_script: ScriptBuf,
    // Upholds the single-Created-bundle invariant across concurrent callers.
    bundle_lock: Mutex<()>,
}

impl<C: MainchainClient> PegManager<C> {
    /// Creates a manager for the sidechain described by `params`.
    ///
    /// `sidechain_script` is the sidechain's deposit script on the
    /// mainchain; its hash keys the latest-deposit and latest-bundle
    /// records.
    pub fn new(db: Arc<ChainDb>, client: C, params: Params, sidechain_script: ScriptBuf) -> Self {
        Self {
            db,
            client,
            params,
            sidechain_script,
            bundle_lock: Mutex::new(()),
        }
    }

    /// The sidechain's deposit script.
    pub fn sidechain_script(&self) -> &ScriptBuf {
        &self.sidechain_script
    }

    fn script_hash(&self) -> sha256d::Hash {
        sha256d::Hash::from_byte_array(hash256(self.sidechain_script.as_bytes()))
    }

    // --- Withdrawals ---

    /// Records a new peg-out request created by the sidechain output at
    /// `funding`.
    pub fn request_withdrawal(&self, withdrawal: &Withdrawal, funding: OutPoint) -> Result<()> {
        if !withdrawal.is_unspent() {
            return Err(StateError::Withdrawal {
                from: withdrawal.status(),
                to: crate::WithdrawalStatus::Unspent,
            }
            .into());
        }

        let id = withdrawal.blind_txid;
        let mut batch = Batch::new();
        batch.put(WithdrawalZone::Unspent.key(&id), withdrawal.encode());
        batch.put(
            layout::withdrawal_outpoint(&id, funding.vout),
            serialize(&funding),
        );
        self.db.commit(batch)?;

        tracing::debug!(
            "Recorded withdrawal {id} paying {} sats (fee {})",
            withdrawal.amount.to_sat(),
            withdrawal.mainchain_fee.to_sat()
        );

        Ok(())
    }

    /// Looks up a withdrawal across all status zones.
    pub fn withdrawal(&self, id: &BlindTxid) -> Result<Option<Withdrawal>> {
        for zone in [
            WithdrawalZone::Unspent,
            WithdrawalZone::Pending,
            WithdrawalZone::Spent,
            WithdrawalZone::Refunded,
        ] {
            if let Some(found) = self.withdrawal_in_zone(zone, id)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Looks up a withdrawal within one status zone.
    pub fn withdrawal_in_zone(
        &self,
        zone: WithdrawalZone,
        id: &BlindTxid,
    ) -> Result<Option<Withdrawal>> {
        match self.db.get(zone.key(id))? {
            Some(raw) => Ok(Some(Withdrawal::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// All withdrawals eligible for bundle selection, in key order.
    pub fn unspent_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        self.db
            .scan_prefix(&WithdrawalZone::Unspent.prefix())?
            .into_iter()
            .map(|(_, raw)| Withdrawal::decode(&raw).map_err(PegError::from))
            .collect()
    }

    /// The sidechain outpoint that created a withdrawal, if recorded.
    pub fn withdrawal_funding(&self, id: &BlindTxid, index: u32) -> Result<Option<OutPoint>> {
        match self.db.get(layout::withdrawal_outpoint(id, index))? {
            Some(raw) => Ok(Some(deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Pays an abandoned peg-out back to its refund script.
    ///
    /// The record moves from the unspent zone to the refunded zone and is
    /// no longer eligible for selection; the returned withdrawal carries the
    /// refund script for the caller to pay.
    pub fn refund_withdrawal(&self, id: &BlindTxid) -> Result<Withdrawal> {
        let withdrawal = self
            .withdrawal_in_zone(WithdrawalZone::Unspent, id)?
            .ok_or(PegError::WithdrawalNotFound(*id))?;

        let mut batch = Batch::new();
        batch.delete(WithdrawalZone::Unspent.key(id));
        batch.put(WithdrawalZone::Refunded.key(id), withdrawal.encode());
        self.db.commit(batch)?;

        tracing::info!("Refunded withdrawal {id}");

        Ok(withdrawal)
    }

    // --- Bundles ---

    /// The bundle currently awaiting mainchain acknowledgement, if any.
    pub fn created_bundle(&self) -> Result<Option<WithdrawalBundle>> {
        let markers = self.db.scan_prefix(&BundleZone::Created.prefix())?;

        let (key, _) = match markers.as_slice() {
            [] => return Ok(None),
            [only] => only,
            _ => {
                return Err(PegError::Corrupt(format!(
                    "{} bundles marked created, expected at most one",
                    markers.len()
                )));
            }
        };

        let hash = bundle_hash_from_key(key)?;
        let bundle = self
            .bundle(&hash)?
            .ok_or_else(|| PegError::Corrupt(format!("created bundle {hash} has no record")))?;

        Ok(Some(bundle))
    }

    /// Looks up a bundle record by its commitment hash.
    pub fn bundle(&self, hash: &BundleHash) -> Result<Option<WithdrawalBundle>> {
        match self.db.get(layout::bundle_record(hash))? {
            Some(raw) => Ok(Some(WithdrawalBundle::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Aggregates the unspent withdrawals into a new bundle at `height`.
    ///
    /// Fails with [`StateError::BundleAlreadyActive`] while a created bundle
    /// exists. The bundle record, its zone marker, the member moves into the
    /// pending zone and the latest-bundle pointer are committed atomically,
    /// then the bundle is announced to the mainchain. A failed announcement
    /// leaves the bundle created; retry with
    /// [`Self::broadcast_created_bundle`].
    pub fn create_bundle(&self, height: u32) -> Result<WithdrawalBundle> {
        let _guard = self.bundle_lock.lock();

        if self.created_bundle()?.is_some() {
            return Err(StateError::BundleAlreadyActive.into());
        }

        let candidates = self.unspent_withdrawals()?;
        if candidates.is_empty() {
            return Err(PegError::NoEligibleWithdrawals);
        }

        let mut members = select_withdrawals(candidates, MAX_BUNDLE_MEMBERS);
        let tx = aggregate_transaction(&members);
        let member_ids: Vec<BlindTxid> = members.iter().map(|w| w.blind_txid).collect();
        let failed_height = height.saturating_add(self.params.bundle_fail_window);
        let bundle = WithdrawalBundle::new(
            self.params.sidechain_number,
            tx,
            member_ids,
            height,
            failed_height,
        );
        let hash = bundle.bundle_hash();

        let mut batch = Batch::new();
        for member in &mut members {
            member.select_into_bundle()?;
            batch.delete(WithdrawalZone::Unspent.key(&member.blind_txid));
            batch.put(
                WithdrawalZone::Pending.key(&member.blind_txid),
                member.encode(),
            );
        }
        batch.put(layout::bundle_record(&hash), bundle.encode());
        batch.put(BundleZone::Created.key(&hash), b"");
        batch.put(
            layout::latest_bundle(&self.script_hash()),
            serialize(&OutPoint {
                txid: Txid::from_byte_array(hash.to_byte_array()),
                vout: 0,
            }),
        );
        self.db.commit(batch)?;

        tracing::info!(
            "Created withdrawal bundle {hash} with {} members at height {height}, deadline {failed_height}",
            bundle.members().len()
        );

        self.client
            .broadcast_withdrawal_bundle(self.params.sidechain_number, &hash)?;

        Ok(bundle)
    }

    /// Re-announces the created bundle after a failed broadcast.
    pub fn broadcast_created_bundle(&self) -> Result<()> {
        let bundle = self
            .created_bundle()?
            .ok_or(PegError::Corrupt("no created bundle to broadcast".into()))?;

        self.client
            .broadcast_withdrawal_bundle(self.params.sidechain_number, &bundle.bundle_hash())?;

        Ok(())
    }

    /// Drives the created bundle's finality at the given sidechain height.
    ///
    /// The bundle becomes `Spent` when the mainchain reports the required
    /// work-score (or the withdrawal as spent) before the deadline, and
    /// `Failed` once the height passes `failed_height` without it (or the
    /// mainchain reports the withdrawal as failed). Client errors are a
    /// definite failure of this check and leave the bundle untouched.
    pub fn check_bundle_finality(&self, height: u32) -> Result<Option<BundleStatus>> {
        let _guard = self.bundle_lock.lock();

        let Some(bundle) = self.created_bundle()? else {
            return Ok(None);
        };
        let hash = bundle.bundle_hash();
        let sidechain = self.params.sidechain_number;

        let spent_on_main = self.client.has_spent_withdrawal(&hash, sidechain)?;
        let work_score = self.client.get_work_score(sidechain, &hash)?;
        if spent_on_main || work_score.is_some_and(|score| score >= self.params.required_work_score)
        {
            self.finalize_spent(bundle)?;
            return Ok(Some(BundleStatus::Spent));
        }

        let failed_on_main = self.client.has_failed_withdrawal(&hash, sidechain)?;
        if failed_on_main || height > bundle.failed_height {
            self.finalize_failed(bundle)?;
            return Ok(Some(BundleStatus::Failed));
        }

        Ok(None)
    }

    /// The latest bundle outpoint recorded for this sidechain.
    pub fn latest_bundle_outpoint(&self) -> Result<Option<OutPoint>> {
        match self.db.get(layout::latest_bundle(&self.script_hash()))? {
            Some(raw) => Ok(Some(deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn finalize_spent(&self, mut bundle: WithdrawalBundle) -> Result<()> {
        bundle.mark_spent()?;
        let hash = bundle.bundle_hash();

        let mut batch = Batch::new();
        self.cascade_members(&bundle, &mut batch, |member| member.mark_spent())?;
        batch.delete(BundleZone::Created.key(&hash));
        batch.put(BundleZone::Spent.key(&hash), b"");
        batch.put(layout::bundle_record(&hash), bundle.encode());
        self.db.commit(batch)?;

        tracing::info!("Withdrawal bundle {hash} spent on the mainchain");

        Ok(())
    }

    fn finalize_failed(&self, mut bundle: WithdrawalBundle) -> Result<()> {
        bundle.mark_failed()?;
        let hash = bundle.bundle_hash();

        let mut batch = Batch::new();
        self.cascade_members(&bundle, &mut batch, |member| member.release_from_bundle())?;
        batch.delete(BundleZone::Created.key(&hash));
        batch.put(BundleZone::Failed.key(&hash), b"");
        batch.put(layout::bundle_record(&hash), bundle.encode());
        self.db.commit(batch)?;

        tracing::info!(
            "Withdrawal bundle {hash} failed, {} members released",
            bundle.members().len()
        );

        Ok(())
    }

    /// Applies a terminal transition to every member still pending.
    fn cascade_members(
        &self,
        bundle: &WithdrawalBundle,
        batch: &mut Batch,
        transition: impl Fn(&mut Withdrawal) -> std::result::Result<(), StateError>,
    ) -> Result<()> {
        for id in bundle.members() {
            let Some(mut member) = self.withdrawal_in_zone(WithdrawalZone::Pending, id)? else {
                return Err(PegError::Corrupt(format!(
                    "bundle member {id} missing from the pending zone"
                )));
            };

            if !member.is_pending() {
                tracing::warn!(
                    "Bundle member {id} is {} in the pending zone, skipping",
                    member.status()
                );
                continue;
            }

            transition(&mut member)?;
            batch.delete(WithdrawalZone::Pending.key(id));
            let zone = match member.status() {
                crate::WithdrawalStatus::Spent => WithdrawalZone::Spent,
                _ => WithdrawalZone::Unspent,
            };
            batch.put(zone.key(id), member.encode());
        }

        Ok(())
    }

    // --- Deposits ---

    /// Verifies a peg-in against the mainchain and records it.
    pub fn record_deposit(&self, deposit: &Deposit) -> Result<()> {
        let txid = deposit.txid();

        if !deposit.verify(&self.client)? {
            return Err(PegError::DepositRejected(txid));
        }

        let mut batch = Batch::new();
        batch.put(
            layout::deposit_outpoint(&txid, deposit.index),
            deposit.encode(),
        );
        batch.put(
            layout::latest_deposit(&self.script_hash()),
            txid.to_byte_array(),
        );
        self.db.commit(batch)?;

        tracing::info!(
            "Recorded deposit {txid}:{} of {} sats",
            deposit.index,
            deposit.amount.to_sat()
        );

        Ok(())
    }

    /// Looks up a recorded deposit by its funding outpoint.
    pub fn deposit(&self, txid: &Txid, index: u32) -> Result<Option<Deposit>> {
        match self.db.get(layout::deposit_outpoint(txid, index))? {
            Some(raw) => Ok(Some(Deposit::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// The most recently recorded deposit for this sidechain.
    pub fn latest_deposit(&self) -> Result<Option<Txid>> {
        match self.db.get(layout::latest_deposit(&self.script_hash()))? {
            Some(raw) => {
                let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
                    PegError::Corrupt(format!(
                        "latest deposit hash: expected 32 bytes, got {}",
                        raw.len()
                    ))
                })?;
                Ok(Some(Txid::from_byte_array(bytes)))
            }
            None => Ok(None),
        }
    }

    /// Consumes a deposit once it has been spent into a sidechain output.
    pub fn spend_deposit(&self, txid: &Txid, index: u32) -> Result<()> {
        if self.deposit(txid, index)?.is_none() {
            return Err(PegError::DepositNotFound {
                txid: *txid,
                index,
            });
        }

        let mut batch = Batch::new();
        batch.delete(layout::deposit_outpoint(txid, index));
        self.db.commit(batch)?;

        tracing::debug!("Deposit {txid}:{index} spent into the sidechain");

        Ok(())
    }
}

fn bundle_hash_from_key(key: &[u8]) -> Result<BundleHash> {
    let bytes: [u8; 32] = key
        .get(1..)
        .and_then(|tail| tail.try_into().ok())
        .ok_or_else(|| PegError::Corrupt(format!("bundle zone key of length {}", key.len())))?;
    Ok(BundleHash::from_byte_array(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WithdrawalStatus;
    use bitcoin::Amount;
    use parking_lot::Mutex as PlMutex;
    use sidecoin_mainchain::{ClientError, MainchainClient};
    use sidecoin_primitives::{BundleHash, Network, SideBlockHash};
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct MockMainchain {
        work_scores: PlMutex<HashMap<BundleHash, u32>>,
        spent: PlMutex<HashSet<BundleHash>>,
        failed: PlMutex<HashSet<BundleHash>>,
        broadcasts: PlMutex<Vec<BundleHash>>,
        valid_deposits: PlMutex<HashSet<Txid>>,
        transport_down: PlMutex<bool>,
    }

    impl MockMainchain {
        fn set_work_score(&self, hash: BundleHash, score: u32) {
            self.work_scores.lock().insert(hash, score);
        }

        fn check_transport(&self) -> sidecoin_mainchain::Result<()> {
            if *self.transport_down.lock() {
                return Err(ClientError::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    impl MainchainClient for MockMainchain {
        fn broadcast_withdrawal_bundle(
            &self,
            _sidechain: u8,
            bundle: &BundleHash,
        ) -> sidecoin_mainchain::Result<()> {
            self.check_transport()?;
            self.broadcasts.lock().push(*bundle);
            Ok(())
        }

        fn verify_bmm(
            &self,
            _main_block: &bitcoin::BlockHash,
            _bmm_hash: &SideBlockHash,
            _sidechain: u8,
        ) -> sidecoin_mainchain::Result<bool> {
            self.check_transport()?;
            Ok(true)
        }

        fn get_block_count(&self) -> sidecoin_mainchain::Result<u64> {
            self.check_transport()?;
            Ok(0)
        }

        fn get_sidechain_tip(&self, _sidechain: u8) -> sidecoin_mainchain::Result<Option<OutPoint>> {
            self.check_transport()?;
            Ok(None)
        }

        fn has_spent_withdrawal(
            &self,
            bundle: &BundleHash,
            _sidechain: u8,
        ) -> sidecoin_mainchain::Result<bool> {
            self.check_transport()?;
            Ok(self.spent.lock().contains(bundle))
        }

        fn has_failed_withdrawal(
            &self,
            bundle: &BundleHash,
            _sidechain: u8,
        ) -> sidecoin_mainchain::Result<bool> {
            self.check_transport()?;
            Ok(self.failed.lock().contains(bundle))
        }

        fn get_work_score(
            &self,
            _sidechain: u8,
            bundle: &BundleHash,
        ) -> sidecoin_mainchain::Result<Option<u32>> {
            self.check_transport()?;
            Ok(self.work_scores.lock().get(bundle).copied())
        }

        fn verify_deposit(
            &self,
            _main_block: &bitcoin::BlockHash,
            txid: &Txid,
            _tx_index: u32,
        ) -> sidecoin_mainchain::Result<bool> {
            self.check_transport()?;
            Ok(self.valid_deposits.lock().contains(txid))
        }
    }

    fn manager(dir: &tempfile::TempDir) -> PegManager<MockMainchain> {
        manager_with_params(dir, Params::new(Network::Regtest))
    }

    fn manager_with_params(
        dir: &tempfile::TempDir,
        params: Params,
    ) -> PegManager<MockMainchain> {
        let db = Arc::new(ChainDb::open(dir.path()).unwrap());
        PegManager::new(
            db,
            MockMainchain::default(),
            params,
            ScriptBuf::from_bytes(vec![0x51, 0x21]),
        )
    }

    fn withdrawal(tag: u8, fee: u64) -> Withdrawal {
        Withdrawal::new(
            0,
            ScriptBuf::from_bytes(vec![0x51, tag]),
            ScriptBuf::from_bytes(vec![0x52, tag]),
            Amount::from_sat(10_000),
            Amount::from_sat(fee),
            BlindTxid::from_byte_array([tag; 32]),
        )
    }

    fn funding(tag: u8) -> OutPoint {
        OutPoint {
            txid: Txid::from_byte_array([tag; 32]),
            vout: 0,
        }
    }

    #[test]
    fn withdrawals_are_selected_by_fee_into_a_single_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let cheap = withdrawal(1, 5_000);
        let rich = withdrawal(2, 20_000);
        manager.request_withdrawal(&cheap, funding(1)).unwrap();
        manager.request_withdrawal(&rich, funding(2)).unwrap();

        let bundle = manager.create_bundle(100).unwrap();
        assert_eq!(bundle.members().len(), 2);
        assert_eq!(bundle.members()[0], rich.blind_txid);
        assert_eq!(bundle.members()[1], cheap.blind_txid);

        // Members moved to the pending zone.
        assert!(manager.unspent_withdrawals().unwrap().is_empty());
        let pending = manager
            .withdrawal_in_zone(WithdrawalZone::Pending, &rich.blind_txid)
            .unwrap()
            .unwrap();
        assert_eq!(pending.status(), WithdrawalStatus::Pending);

        // The bundle was announced to the mainchain.
        assert_eq!(
            manager.client.broadcasts.lock().as_slice(),
            &[bundle.bundle_hash()]
        );

        // Only one bundle may be created at a time.
        let extra = withdrawal(3, 1_000);
        manager.request_withdrawal(&extra, funding(3)).unwrap();
        assert!(matches!(
            manager.create_bundle(101),
            Err(PegError::State(StateError::BundleAlreadyActive))
        ));
    }

    #[test]
    fn bundle_spends_once_work_score_reaches_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let threshold = manager.params.required_work_score;

        let w = withdrawal(1, 5_000);
        manager.request_withdrawal(&w, funding(1)).unwrap();
        let bundle = manager.create_bundle(100).unwrap();
        let hash = bundle.bundle_hash();

        // Below threshold and before the deadline nothing changes.
        manager.client.set_work_score(hash, threshold - 1);
        assert_eq!(manager.check_bundle_finality(101).unwrap(), None);

        manager.client.set_work_score(hash, threshold);
        assert_eq!(
            manager.check_bundle_finality(102).unwrap(),
            Some(BundleStatus::Spent)
        );

        // Cascade: the member moved to the spent zone.
        let spent = manager
            .withdrawal_in_zone(WithdrawalZone::Spent, &w.blind_txid)
            .unwrap()
            .unwrap();
        assert_eq!(spent.status(), WithdrawalStatus::Spent);
        assert!(manager
            .withdrawal_in_zone(WithdrawalZone::Pending, &w.blind_txid)
            .unwrap()
            .is_none());

        // The bundle is terminal and retained for audit.
        assert!(manager.created_bundle().unwrap().is_none());
        let stored = manager.bundle(&hash).unwrap().unwrap();
        assert!(stored.is_spent());

        // Finality checks are idempotent once no bundle is active.
        assert_eq!(manager.check_bundle_finality(103).unwrap(), None);
    }

    #[test]
    fn bundle_fails_once_the_deadline_passes() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = Params::new(Network::Regtest);
        params.bundle_fail_window = 50;
        let manager = manager_with_params(&dir, params);

        let w = withdrawal(1, 5_000);
        manager.request_withdrawal(&w, funding(1)).unwrap();

        let bundle = manager.create_bundle(100).unwrap();
        assert_eq!(bundle.failed_height, 150);
        manager.client.set_work_score(bundle.bundle_hash(), 3);

        // At the deadline itself the bundle still waits.
        assert_eq!(manager.check_bundle_finality(150).unwrap(), None);

        // One block past the deadline it fails.
        assert_eq!(
            manager.check_bundle_finality(151).unwrap(),
            Some(BundleStatus::Failed)
        );

        // Cascade: the member reverted to unspent, eligible again.
        let released = manager
            .withdrawal_in_zone(WithdrawalZone::Unspent, &w.blind_txid)
            .unwrap()
            .unwrap();
        assert_eq!(released.status(), WithdrawalStatus::Unspent);

        let stored = manager.bundle(&bundle.bundle_hash()).unwrap().unwrap();
        assert!(stored.is_failed());

        // A new bundle can now pick the released withdrawal up.
        let next = manager.create_bundle(151).unwrap();
        assert_eq!(next.members(), &[w.blind_txid]);
    }

    #[test]
    fn mainchain_errors_are_definite_failures() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let w = withdrawal(1, 5_000);
        manager.request_withdrawal(&w, funding(1)).unwrap();
        let bundle = manager.create_bundle(100).unwrap();

        *manager.client.transport_down.lock() = true;
        assert!(matches!(
            manager.check_bundle_finality(101),
            Err(PegError::Mainchain(ClientError::Transport(_)))
        ));

        // The bundle is untouched and the check can be retried.
        *manager.client.transport_down.lock() = false;
        manager
            .client
            .set_work_score(bundle.bundle_hash(), manager.params.required_work_score);
        assert_eq!(
            manager.check_bundle_finality(102).unwrap(),
            Some(BundleStatus::Spent)
        );
    }

    #[test]
    fn deposits_are_verified_before_recording() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let deposit = {
            use bitcoin::absolute::LockTime;
            use bitcoin::transaction::Version;
            use bitcoin::{Sequence, TxIn, TxOut, Witness};

            Deposit {
                sidechain: 0,
                amount: Amount::from_sat(250_000),
                deposit_tx: bitcoin::Transaction {
                    version: Version::TWO,
                    lock_time: LockTime::ZERO,
                    input: vec![TxIn {
                        previous_output: OutPoint::null(),
                        script_sig: ScriptBuf::from_bytes(vec![0x01]),
                        sequence: Sequence::MAX,
                        witness: Witness::new(),
                    }],
                    output: vec![TxOut {
                        value: Amount::from_sat(250_000),
                        script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
                    }],
                },
                index: 0,
                tx_index: 1,
                mainchain_block: bitcoin::BlockHash::from_byte_array([0xaa; 32]),
            }
        };
        let txid = deposit.txid();

        // The mainchain does not know the transaction yet.
        assert!(matches!(
            manager.record_deposit(&deposit),
            Err(PegError::DepositRejected(_))
        ));
        assert!(manager.deposit(&txid, 0).unwrap().is_none());

        manager.client.valid_deposits.lock().insert(txid);
        manager.record_deposit(&deposit).unwrap();

        assert_eq!(manager.deposit(&txid, 0).unwrap(), Some(deposit));
        assert_eq!(manager.latest_deposit().unwrap(), Some(txid));

        // Consuming the deposit removes its outpoint record.
        manager.spend_deposit(&txid, 0).unwrap();
        assert!(manager.deposit(&txid, 0).unwrap().is_none());
        assert!(matches!(
            manager.spend_deposit(&txid, 0),
            Err(PegError::DepositNotFound { .. })
        ));
    }

    #[test]
    fn refunded_withdrawals_leave_circulation() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let w = withdrawal(1, 5_000);
        manager.request_withdrawal(&w, funding(1)).unwrap();

        let refunded = manager.refund_withdrawal(&w.blind_txid).unwrap();
        assert_eq!(refunded.refund_script, w.refund_script);

        assert!(manager.unspent_withdrawals().unwrap().is_empty());
        assert!(manager
            .withdrawal_in_zone(WithdrawalZone::Refunded, &w.blind_txid)
            .unwrap()
            .is_some());

        // Nothing eligible, so no bundle can form.
        assert!(matches!(
            manager.create_bundle(10),
            Err(PegError::NoEligibleWithdrawals)
        ));

        // Refunding twice is an error.
        assert!(matches!(
            manager.refund_withdrawal(&w.blind_txid),
            Err(PegError::WithdrawalNotFound(_))
        ));
    }
}
