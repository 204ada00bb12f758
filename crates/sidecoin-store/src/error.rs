//! Error types for the persistent layout.

use sidecoin_primitives::SideBlockHash;

/// Errors from the persistent layout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("rocksdb error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    /// Record serialization error.
    #[error("record codec error: {0}")]
    Bincode(#[from] bincode::Error),

    /// A fixed-layout record failed to decode.
    #[error("record decode error: {0}")]
    Decode(#[from] sidecoin_primitives::DecodeError),

    /// The database was written by an unsupported schema.
    #[error("unsupported database schema version {on_disk}, this build expects {expected}")]
    SchemaVersion { on_disk: u32, expected: u32 },

    /// The entry does not extend the current tip.
    #[error("entry {got} at height {height} does not extend tip {tip} at height {tip_height}")]
    NonSequentialEntry {
        got: SideBlockHash,
        height: u32,
        tip: SideBlockHash,
        tip_height: u32,
    },

    /// The first entry of an empty index must be genesis.
    #[error("entry {got} at height {height} cannot start an empty index")]
    MissingGenesis { got: SideBlockHash, height: u32 },

    /// A stored record is malformed beyond its codec's vocabulary.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
