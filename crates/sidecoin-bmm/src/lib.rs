//! Blind-merge-mining support.
//!
//! Blind merge mining lets a sidechain block be committed inside a mainchain
//! transaction without the miner holding full sidechain state. The cache in
//! this crate lets a node quickly corroborate that a claimed previous block
//! is one it has actually seen mined, without re-deriving the full chain.

mod cache;

pub use cache::{BmmCache, Linkage};
