//! In-memory set of recently merge-mined block identifiers.

use bitcoin::hashes::Hash;
use sidecoin_primitives::SideBlockHash;
use std::collections::HashSet;

/// Outcome of a previous-block linkage probe.
///
/// The cache holds no authority: it can accept a linkage it has witnessed,
/// or report that it cannot decide. It never rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// The linkage is corroborated by the cache.
    Accepted,
    /// The cache cannot decide; the caller escalates the carried hash to a
    /// full chain-index lookup.
    Inconclusive(SideBlockHash),
}

impl Linkage {
    /// Whether the probe was corroborated without escalation.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Linkage::Accepted)
    }
}

/// Membership cache of recently merge-mined block identifiers.
///
/// Volatile: cleared on restart and rebuilt from recent chain data. An empty
/// or partial cache only costs an extra index lookup, never correctness.
#[derive(Debug, Default)]
pub struct BmmCache {
    seen: HashSet<SideBlockHash>,
}

impl BmmCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a locally produced or observed merge-mined block.
    ///
    /// Returns `false` for the degenerate all-zero identifier: nothing was
    /// meant to change, so the no-op is reported to the caller rather than
    /// raised as an error.
    pub fn record(&mut self, block: SideBlockHash) -> bool {
        if block == SideBlockHash::all_zeros() {
            tracing::warn!("Ignoring degenerate BMM block identifier");
            return false;
        }

        self.seen.insert(block);
        true
    }

    /// Probes whether `hash` is an acceptable previous-block claim.
    ///
    /// While the cache holds fewer than two entries linkage cannot yet be
    /// disproven, so any claim is accepted (cold-start bootstrap). A known
    /// member is accepted; anything else is inconclusive and escalates.
    pub fn accepts_previous(&self, hash: SideBlockHash) -> Linkage {
        if self.seen.len() < 2 || self.seen.contains(&hash) {
            return Linkage::Accepted;
        }

        Linkage::Inconclusive(hash)
    }

    /// Membership test without the bootstrap rule.
    pub fn contains(&self, hash: &SideBlockHash) -> bool {
        self.seen.contains(hash)
    }

    /// Empties the cache, e.g. on a reorg.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Rebuilds the cache from recent chain data on startup.
    pub fn warm<I>(&mut self, hashes: I)
    where
        I: IntoIterator<Item = SideBlockHash>,
    {
        for hash in hashes {
            self.record(hash);
        }
    }

    /// Number of cached identifiers.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
