//! SQLite snapshot history store.
//!
//! # Responsibility
//! - Append one revision row per save and prune old revisions.
//! - Load the newest revision, or any retained one by number.
//!
//! # Invariants
//! - Revision numbers strictly increase and are never reused.
//! - At most `SNAPSHOT_HISTORY_LIMIT` revisions are retained after a save.

use crate::collab::{PersistenceAdapter, StoreError};
use crate::db::{open_db, open_db_in_memory};
use crate::model::snapshot::DocumentSnapshot;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of snapshot revisions kept in the history table.
pub const SNAPSHOT_HISTORY_LIMIT: usize = 50;

/// Metadata of one stored revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRevision {
    pub revision: i64,
    pub saved_at_ms: i64,
    pub title: String,
}

/// Snapshot store keeping a bounded revision history.
pub struct SqliteSnapshotStore {
    conn: Connection,
    history_limit: usize,
}

impl SqliteSnapshotStore {
    /// Opens (or creates) a history database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a throwaway in-memory history.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            history_limit: SNAPSHOT_HISTORY_LIMIT,
        }
    }

    /// Overrides the retained history size. Zero is treated as one.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Lists retained revisions, newest first.
    pub fn list_revisions(&self) -> Result<Vec<SnapshotRevision>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT revision, saved_at_ms, title
             FROM document_snapshots
             ORDER BY revision DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SnapshotRevision {
                revision: row.get(0)?,
                saved_at_ms: row.get(1)?,
                title: row.get(2)?,
            })
        })?;
        let revisions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(revisions)
    }

    /// Loads one retained revision.
    pub fn load_revision(&self, revision: i64) -> Result<Option<DocumentSnapshot>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM document_snapshots WHERE revision = ?1",
                params![revision],
                |row| row.get(0),
            )
            .optional()?;
        decode(body)
    }
}

impl PersistenceAdapter for SqliteSnapshotStore {
    fn load(&mut self) -> Result<Option<DocumentSnapshot>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM document_snapshots ORDER BY revision DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let found = body.is_some();
        let snapshot = decode(body)?;
        info!("event=store_load module=store status=ok backend=sqlite found={found}");
        Ok(snapshot)
    }

    fn save(&mut self, snapshot: &DocumentSnapshot) -> Result<(), StoreError> {
        let body = serde_json::to_string(snapshot)?;
        let limit = i64::try_from(self.history_limit).unwrap_or(i64::MAX);

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO document_snapshots (saved_at_ms, title, body) VALUES (?1, ?2, ?3)",
            params![now_ms(), snapshot.title, body],
        )?;
        let revision = tx.last_insert_rowid();
        let pruned = tx.execute(
            "DELETE FROM document_snapshots
             WHERE revision NOT IN (
                 SELECT revision FROM document_snapshots ORDER BY revision DESC LIMIT ?1
             )",
            params![limit],
        )?;
        tx.commit()?;

        info!(
            "event=store_save module=store status=ok backend=sqlite revision={} pruned={}",
            revision, pruned
        );
        Ok(())
    }
}

fn decode(body: Option<String>) -> Result<Option<DocumentSnapshot>, StoreError> {
    body.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(StoreError::from)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
