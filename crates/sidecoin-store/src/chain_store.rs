//! Typed chain-index accessors over the raw key-value layout.

use crate::db::decode_u32;
use crate::{layout, Batch, ChainDb, Error, Result};
use bitcoin::hashes::Hash;
use serde::{Deserialize, Serialize};
use sidecoin_primitives::{
    ChainEntry, Deployment, Network, Params, SideBlockHash, ThresholdState,
};
use std::sync::Arc;

/// Node-local chain options persisted under the `O` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOptions {
    /// Network the database belongs to.
    pub network: Network,
    /// Sidechain slot number the database was created for.
    pub sidechain: u8,
}

/// Chain index store.
///
/// Entry admission is strictly sequential: entries are appended in height
/// order against the current tip, and an accepted entry together with all of
/// its derived indexes is committed as one atomic batch. Committed entries
/// are never mutated.
pub struct ChainStore {
    db: Arc<ChainDb>,
    params: Params,
}

impl ChainStore {
    /// Creates a store over an open database.
    pub fn new(db: Arc<ChainDb>, params: Params) -> Self {
        Self { db, params }
    }

    /// The store's network parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Appends an entry to the index.
    ///
    /// The entry must extend the current tip (or be genesis on an empty
    /// index). Writes the entry record, both hash/height indexes, the
    /// parent's next-hash link and the new tip in a single batch.
    pub fn connect_entry(&self, entry: &ChainEntry) -> Result<()> {
        let hash = entry.hash();

        match self.tip()? {
            Some((tip_hash, tip_height)) => {
                if entry.header.prev_block != tip_hash || entry.height != tip_height + 1 {
                    return Err(Error::NonSequentialEntry {
                        got: hash,
                        height: entry.height,
                        tip: tip_hash,
                        tip_height,
                    });
                }
            }
            None => {
                if !entry.is_genesis() {
                    return Err(Error::MissingGenesis {
                        got: hash,
                        height: entry.height,
                    });
                }
            }
        }

        let mut batch = Batch::new();
        batch.put(layout::entry(&hash), entry.encode());
        batch.put(layout::height_index(&hash), entry.height.to_le_bytes());
        batch.put(layout::hash_index(entry.height), hash.to_byte_array());
        if !entry.is_genesis() {
            batch.put(
                layout::next_hash(&entry.header.prev_block),
                hash.to_byte_array(),
            );
        }
        batch.put(layout::tip(), hash.to_byte_array());
        self.db.commit(batch)?;

        tracing::debug!("Connected entry {hash} at height {}", entry.height);

        Ok(())
    }

    /// The current tip, if the index is non-empty.
    pub fn tip(&self) -> Result<Option<(SideBlockHash, u32)>> {
        let Some(raw) = self.db.get(layout::tip())? else {
            return Ok(None);
        };
        let hash = decode_hash(&raw, "tip hash")?;
        let height = self
            .height_of(&hash)?
            .ok_or_else(|| Error::Corrupt(format!("tip {hash} has no height index")))?;

        Ok(Some((hash, height)))
    }

    /// The tip's full entry.
    pub fn tip_entry(&self) -> Result<Option<ChainEntry>> {
        match self.tip()? {
            Some((hash, _)) => self.entry(&hash),
            None => Ok(None),
        }
    }

    /// Looks up an entry by block hash.
    pub fn entry(&self, hash: &SideBlockHash) -> Result<Option<ChainEntry>> {
        match self.db.get(layout::entry(hash))? {
            Some(raw) => Ok(Some(ChainEntry::decode(&raw, &self.params)?)),
            None => Ok(None),
        }
    }

    /// Looks up an entry by height.
    pub fn entry_at(&self, height: u32) -> Result<Option<ChainEntry>> {
        match self.hash_at(height)? {
            Some(hash) => self.entry(&hash),
            None => Ok(None),
        }
    }

    /// Height of a block hash, if indexed.
    pub fn height_of(&self, hash: &SideBlockHash) -> Result<Option<u32>> {
        self.db
            .get(layout::height_index(hash))?
            .map(|raw| decode_u32(&raw, "height index"))
            .transpose()
    }

    /// Block hash at a height, if indexed.
    pub fn hash_at(&self, height: u32) -> Result<Option<SideBlockHash>> {
        self.db
            .get(layout::hash_index(height))?
            .map(|raw| decode_hash(&raw, "hash index"))
            .transpose()
    }

    /// The hash following `hash` on the main chain, if any.
    pub fn next_hash(&self, hash: &SideBlockHash) -> Result<Option<SideBlockHash>> {
        self.db
            .get(layout::next_hash(hash))?
            .map(|raw| decode_hash(&raw, "next-hash index"))
            .transpose()
    }

    /// The most recent `depth` block hashes, tip first.
    ///
    /// Used to warm the BMM cache on startup.
    pub fn recent_block_hashes(&self, depth: u32) -> Result<Vec<SideBlockHash>> {
        let Some((_, tip_height)) = self.tip()? else {
            return Ok(Vec::new());
        };
        if depth == 0 {
            return Ok(Vec::new());
        }

        let mut hashes = Vec::new();
        let floor = tip_height.saturating_sub(depth.saturating_sub(1).min(tip_height));
        for height in (floor..=tip_height).rev() {
            if let Some(hash) = self.hash_at(height)? {
                hashes.push(hash);
            }
        }

        Ok(hashes)
    }

    /// Persists the chain options record.
    pub fn put_options(&self, options: &ChainOptions) -> Result<()> {
        self.db.put(layout::options(), bincode::serialize(options)?)
    }

    /// Reads the chain options record.
    pub fn options(&self) -> Result<Option<ChainOptions>> {
        self.db
            .get(layout::options())?
            .map(|raw| bincode::deserialize(&raw).map_err(Error::from))
            .transpose()
    }

    /// Persists the versionbits deployment table.
    pub fn put_deployments(&self, deployments: &[Deployment]) -> Result<()> {
        self.db
            .put(layout::deployments(), bincode::serialize(deployments)?)
    }

    /// Reads the versionbits deployment table.
    pub fn deployments(&self) -> Result<Option<Vec<Deployment>>> {
        self.db
            .get(layout::deployments())?
            .map(|raw| bincode::deserialize(&raw).map_err(Error::from))
            .transpose()
    }

    /// Records the threshold state of a deployment bit at a block.
    pub fn set_versionbits_state(
        &self,
        bit: u8,
        hash: &SideBlockHash,
        state: ThresholdState,
    ) -> Result<()> {
        self.db
            .put(layout::versionbits_state(bit, hash), [state.as_u8()])
    }

    /// Reads the threshold state of a deployment bit at a block.
    pub fn versionbits_state(
        &self,
        bit: u8,
        hash: &SideBlockHash,
    ) -> Result<Option<ThresholdState>> {
        self.db
            .get(layout::versionbits_state(bit, hash))?
            .map(|raw| {
                if raw.len() != 1 {
                    return Err(Error::Corrupt(format!(
                        "versionbits state: expected 1 byte, got {}",
                        raw.len()
                    )));
                }
                ThresholdState::from_u8(raw[0]).ok_or_else(|| {
                    Error::Corrupt(format!("versionbits state byte {} out of range", raw[0]))
                })
            })
            .transpose()
    }
}

fn decode_hash(raw: &[u8], what: &str) -> Result<SideBlockHash> {
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| Error::Corrupt(format!("{what}: expected 32 bytes, got {}", raw.len())))?;
    Ok(SideBlockHash::from_byte_array(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{BlockHash, TxMerkleNode};
    use sidecoin_primitives::{BundleHash, Header};

    fn open_store(dir: &tempfile::TempDir) -> ChainStore {
        let db = Arc::new(ChainDb::open(dir.path()).unwrap());
        ChainStore::new(db, Params::new(Network::Regtest))
    }

    fn child_of(parent: &ChainEntry, params: &Params) -> ChainEntry {
        let header = Header {
            version: 1,
            prev_block: parent.hash(),
            merkle_root: TxMerkleNode::from_byte_array([parent.height as u8 + 1; 32]),
            withdrawal_bundle: BundleHash::all_zeros(),
            mainchain_block: BlockHash::all_zeros(),
            time: parent.header.time + 600,
        };
        ChainEntry::from_header(header, Some(parent), params).unwrap()
    }

    #[test]
    fn connect_and_read_back_a_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let params = store.params().clone();

        let genesis = ChainEntry::genesis(&params);
        store.connect_entry(&genesis).unwrap();

        let block1 = child_of(&genesis, &params);
        store.connect_entry(&block1).unwrap();

        let (tip_hash, tip_height) = store.tip().unwrap().unwrap();
        assert_eq!(tip_hash, block1.hash());
        assert_eq!(tip_height, 1);

        let loaded = store.entry(&block1.hash()).unwrap().unwrap();
        assert_eq!(loaded, block1);
        assert_eq!(store.entry_at(0).unwrap().unwrap(), genesis);
        assert_eq!(store.height_of(&block1.hash()).unwrap(), Some(1));
        assert_eq!(
            store.next_hash(&genesis.hash()).unwrap(),
            Some(block1.hash())
        );
    }

    #[test]
    fn admission_is_strictly_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let params = store.params().clone();

        let genesis = ChainEntry::genesis(&params);
        let block1 = child_of(&genesis, &params);
        let block2 = child_of(&block1, &params);

        // The first entry of an empty index must be genesis.
        assert!(matches!(
            store.connect_entry(&block1),
            Err(Error::MissingGenesis { .. })
        ));

        store.connect_entry(&genesis).unwrap();

        // Skipping a height is rejected.
        assert!(matches!(
            store.connect_entry(&block2),
            Err(Error::NonSequentialEntry { .. })
        ));

        store.connect_entry(&block1).unwrap();
        store.connect_entry(&block2).unwrap();
        assert_eq!(store.tip().unwrap().unwrap().1, 2);
    }

    #[test]
    fn chainwork_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let params = Params::new(Network::Regtest);
        let genesis = ChainEntry::genesis(&params);
        let block1 = child_of(&genesis, &params);

        {
            let store = open_store(&dir);
            store.connect_entry(&genesis).unwrap();
            store.connect_entry(&block1).unwrap();
        }

        let store = open_store(&dir);
        let loaded = store.tip_entry().unwrap().unwrap();
        assert_eq!(loaded.chainwork, block1.chainwork);
    }

    #[test]
    fn recent_hashes_walk_back_from_the_tip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let params = store.params().clone();

        let mut entry = ChainEntry::genesis(&params);
        store.connect_entry(&entry).unwrap();
        for _ in 0..4 {
            entry = child_of(&entry, &params);
            store.connect_entry(&entry).unwrap();
        }

        let recent = store.recent_block_hashes(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0], entry.hash());

        // Depth larger than the chain covers the whole chain.
        assert_eq!(store.recent_block_hashes(100).unwrap().len(), 5);
    }

    #[test]
    fn options_and_deployments_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let options = ChainOptions {
            network: Network::Regtest,
            sidechain: 0,
        };
        store.put_options(&options).unwrap();
        assert_eq!(store.options().unwrap(), Some(options));

        let table = store.params().deployments.clone();
        store.put_deployments(&table).unwrap();
        assert_eq!(store.deployments().unwrap(), Some(table));
    }

    #[test]
    fn versionbits_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let hash = SideBlockHash::from_byte_array([9; 32]);

        assert_eq!(store.versionbits_state(1, &hash).unwrap(), None);
        store
            .set_versionbits_state(1, &hash, ThresholdState::LockedIn)
            .unwrap();
        assert_eq!(
            store.versionbits_state(1, &hash).unwrap(),
            Some(ThresholdState::LockedIn)
        );
    }
}
