//! RocksDB-backed ordered key-value store.

use crate::{layout, Error, Result, SCHEMA_VERSION};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;

/// A set of writes applied atomically.
///
/// Everything derived from one accepted block (an entry plus all of its
/// indexes, or one peg lifecycle step) goes through a single batch, so a
/// crash between the individual puts cannot be observed.
#[derive(Default)]
pub struct Batch {
    inner: WriteBatch,
}

impl Batch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a write.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.inner.put(key, value);
    }

    /// Queues a deletion.
    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        self.inner.delete(key);
    }

    /// Whether the batch holds no writes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Handle to the sidechain database.
pub struct ChainDb {
    db: DB,
}

impl ChainDb {
    /// Opens (or creates) the database at `path`.
    ///
    /// The persisted schema version is checked against [`SCHEMA_VERSION`]: a
    /// fresh database is stamped with the current version, a mismatched one
    /// refuses to open.
    pub fn open(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)?;
        let this = Self { db };

        match this.db.get(layout::version())? {
            Some(raw) => {
                let on_disk = decode_u32(&raw, "schema version")?;
                if on_disk != SCHEMA_VERSION {
                    return Err(Error::SchemaVersion {
                        on_disk,
                        expected: SCHEMA_VERSION,
                    });
                }
            }
            None => {
                this.db
                    .put(layout::version(), SCHEMA_VERSION.to_le_bytes())?;
            }
        }

        tracing::info!("Opened sidechain database at {}", path.display());

        Ok(this)
    }

    /// Reads a value.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    /// Writes a single value outside any batch.
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        Ok(self.db.put(key, value)?)
    }

    /// Applies a batch atomically.
    pub fn commit(&self, batch: Batch) -> Result<()> {
        Ok(self.db.write(batch.inner)?)
    }

    /// Collects all records under a key prefix, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.into_vec(), value.into_vec()));
        }

        Ok(out)
    }
}

pub(crate) fn decode_u32(raw: &[u8], what: &str) -> Result<u32> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| Error::Corrupt(format!("{what}: expected 4 bytes, got {}", raw.len())))?;
    Ok(u32::from_le_bytes(bytes))
}
