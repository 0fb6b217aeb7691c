//! Core of the Ergo academic-paper editor.
//! This crate owns the document model and its invariants; UI layers only
//! issue edits and render state.

pub mod collab;
pub mod config;
pub mod db;
pub mod image_import;
pub mod logging;
pub mod model;
pub mod render;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod store;

pub use collab::{
    GenerateError, Generator, ImageImporter, ImportError, PersistenceAdapter, StoreError,
    UniqueIdSource, UuidIdSource,
};
pub use config::{SchedulerConfig, SessionConfig, StoreBackend};
pub use image_import::FsImageImporter;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::formatting::FormattingOptions;
pub use model::people::{Affiliation, AffiliationId, Author, AuthorId};
pub use model::section::{
    ContentBlock, ImageBlock, Section, SectionBody, SectionId, SectionLevel, MAX_SECTION_LEVEL,
    MIN_SECTION_LEVEL,
};
pub use model::snapshot::{DocumentSnapshot, SectionRecord};
pub use render::TypstGenerator;
pub use scheduler::UpdateScheduler;
pub use service::document::{
    DocumentState, DocumentValidationError, EditError, EditErrorKind, LoadReport,
};
pub use service::edit::Edit;
pub use service::people::{PeopleError, PeopleModel};
pub use service::section_tree::{SectionTree, SectionTreeError};
pub use session::{BatchOutcome, Collaborators, EditorSession, Notification, Severity};
pub use store::{JsonFileStore, SnapshotRevision, SqliteSnapshotStore, SNAPSHOT_HISTORY_LIMIT};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
