//! Boundaries to the collaborators the editor core drives.
//!
//! # Responsibility
//! - Define the generator, persistence, image-import and unique-id contracts.
//! - Define collaborator error types surfaced to the user-facing layer.
//!
//! # Invariants
//! - Collaborator failures never roll back or corrupt the in-memory model.
//! - Every contract is object safe so sessions can hold boxed adapters.

use crate::db::DbError;
use crate::model::snapshot::DocumentSnapshot;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Consumes a complete snapshot and produces the serialized document.
pub trait Generator {
    fn generate(&mut self, snapshot: &DocumentSnapshot) -> Result<(), GenerateError>;
}

/// Loads and saves document snapshots.
pub trait PersistenceAdapter {
    /// Returns `None` when nothing has been saved yet.
    fn load(&mut self) -> Result<Option<DocumentSnapshot>, StoreError>;
    fn save(&mut self, snapshot: &DocumentSnapshot) -> Result<(), StoreError>;
}

/// Copies a user-picked image into the project.
pub trait ImageImporter {
    /// Returns the project-relative path, or `None` when the user cancelled.
    fn import_image(
        &mut self,
        source: &Path,
        project_root: &Path,
    ) -> Result<Option<String>, ImportError>;
}

/// Produces identifiers that never collide within one document lifetime.
pub trait UniqueIdSource {
    fn generate_unique_id(&self) -> String;
}

/// Random v4 UUID id source.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdSource;

impl UniqueIdSource for UuidIdSource {
    fn generate_unique_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Document generation failure.
#[derive(Debug)]
pub enum GenerateError {
    /// Output file or directory could not be written.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for GenerateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for GenerateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Snapshot persistence failure.
#[derive(Debug)]
pub enum StoreError {
    /// File read/write failure.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Snapshot could not be encoded or decoded.
    Json(serde_json::Error),
    /// SQLite bootstrap or query failure.
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to access `{}`: {source}", path.display()),
            Self::Json(err) => write!(f, "invalid form data: {err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Image import failure.
#[derive(Debug)]
pub enum ImportError {
    /// Source path does not name a readable file.
    SourceMissing(PathBuf),
    /// Copy into the project failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMissing(path) => write!(f, "image not found: `{}`", path.display()),
            Self::Io { path, source } => {
                write!(f, "failed to import image into `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SourceMissing(_) => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}
