//! Persistent key-value layout for the sidechain consensus core.
//!
//! All consensus entities share one ordered key-value store, namespaced by a
//! single leading byte per entity kind ([`layout`]). Writes for one accepted
//! block are applied as a single atomic batch, so a crash can never leave an
//! entry without its derived indexes or vice versa; the most recent committed
//! batch is the recovery point on restart.

mod chain_store;
mod db;
mod error;
pub mod layout;

pub use chain_store::{ChainOptions, ChainStore};
pub use db::{Batch, ChainDb};
pub use error::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// On-disk schema version this build reads and writes.
///
/// Exactly one schema is supported: a mismatched version refuses to open
/// instead of silently reading historical layouts.
pub const SCHEMA_VERSION: u32 = 1;
