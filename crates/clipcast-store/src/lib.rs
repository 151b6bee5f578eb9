//! Persistence boundary for the ClipCast pipeline.
//!
//! Exposes the registry/ledger as a key-addressed store with atomic
//! read-modify-write per key. The on-disk format is one JSON document per
//! key; callers only ever see the typed records from `clipcast-models`.

pub mod error;
pub mod kv;
pub mod ledger;
pub mod registry;

pub use error::{StoreError, StoreResult};
pub use kv::{JsonFileStore, MemoryStore, StateStore};
pub use ledger::ClipLedger;
pub use registry::SourceRegistry;
