//! Snapshot persistence adapters.
//!
//! # Responsibility
//! - Provide `PersistenceAdapter` implementations for project form data.
//!
//! # Invariants
//! - `load` returns `Ok(None)` when nothing has been saved yet.
//! - A failed save leaves previously saved data readable.

mod json_file;
mod sqlite;

pub use json_file::JsonFileStore;
pub use sqlite::{SnapshotRevision, SqliteSnapshotStore, SNAPSHOT_HISTORY_LIMIT};
