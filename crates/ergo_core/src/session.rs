//! Editor session: document state wired to its collaborators.
//!
//! # Responsibility
//! - Apply edits to the document and notify the update scheduler.
//! - Run regeneration passes (generate, then save) at yield points.
//! - Turn collaborator failures into user-visible notifications.
//!
//! # Invariants
//! - Every mutation and every pass needs `&mut self`; there is one writer.
//! - A pass always sees the state after every edit issued before it.
//! - Collaborator failures never roll back the document.
//! - Loading never triggers more than one pass, and none for an empty load.
//! - A session that loaded nothing and saw no edit never writes project files.

use crate::collab::{
    Generator, ImageImporter, PersistenceAdapter, StoreError, UniqueIdSource, UuidIdSource,
};
use crate::config::{SessionConfig, StoreBackend};
use crate::image_import::FsImageImporter;
use crate::render::TypstGenerator;
use crate::scheduler::UpdateScheduler;
use crate::service::document::{DocumentState, EditError, EditErrorKind, LoadReport};
use crate::service::edit::Edit;
use crate::service::section_tree::SectionTreeError;
use crate::store::{JsonFileStore, SqliteSnapshotStore};
use log::{debug, error, info, warn};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Non-fatal, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// External adapters a session drives.
pub struct Collaborators {
    pub generator: Box<dyn Generator>,
    pub store: Box<dyn PersistenceAdapter>,
    pub importer: Box<dyn ImageImporter>,
    pub ids: Box<dyn UniqueIdSource>,
}

impl Collaborators {
    /// Default adapters for a project directory.
    ///
    /// # Errors
    /// - Returns a store error when the SQLite history cannot be opened.
    pub fn for_project(project_root: &Path, config: &SessionConfig) -> Result<Self, StoreError> {
        let store: Box<dyn PersistenceAdapter> = match config.store {
            StoreBackend::Json => Box::new(JsonFileStore::new(config.form_data_path(project_root))),
            StoreBackend::Sqlite => Box::new(SqliteSnapshotStore::open(
                config.snapshot_db_path(project_root),
            )?),
        };
        Ok(Self {
            generator: Box::new(TypstGenerator::new(project_root, config.clone())),
            store,
            importer: Box::new(FsImageImporter::new(config.images_dir.clone())),
            ids: Box::new(UuidIdSource),
        })
    }
}

/// Result of `EditorSession::apply_batch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// One open project.
pub struct EditorSession {
    project_root: PathBuf,
    document: DocumentState,
    scheduler: UpdateScheduler,
    generator: Box<dyn Generator>,
    store: Box<dyn PersistenceAdapter>,
    importer: Box<dyn ImageImporter>,
    ids: Box<dyn UniqueIdSource>,
    notifications: Vec<Notification>,
    /// Set once the document holds loaded data or any change was requested.
    touched: bool,
}

impl EditorSession {
    /// Creates a session holding an empty document. Call `open` to load.
    pub fn new(
        project_root: impl Into<PathBuf>,
        collaborators: Collaborators,
        config: &SessionConfig,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            document: DocumentState::new(),
            scheduler: UpdateScheduler::new(&config.scheduler),
            generator: collaborators.generator,
            store: collaborators.store,
            importer: collaborators.importer,
            ids: collaborators.ids,
            notifications: Vec::new(),
            touched: false,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Bulk-loads the persisted document under notification suppression.
    ///
    /// Returns the load repairs, or `None` when nothing was loaded.
    pub fn open(&mut self) -> Option<LoadReport> {
        self.scheduler.begin_load();

        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(
                    "event=session_open module=session status=error error_code=load_failed error={}",
                    err
                );
                self.notifications
                    .push(Notification::error(format!("Failed to load form data: {err}")));
                None
            }
        };

        let populated = loaded.as_ref().is_some_and(|snapshot| !snapshot.is_empty());
        let report = match loaded {
            Some(snapshot) => {
                let (document, report) = DocumentState::from_snapshot(snapshot, self.ids.as_ref());
                self.document = document;
                Some(report)
            }
            None => {
                self.document = DocumentState::new();
                None
            }
        };

        if let Some(report) = report.filter(|report| !report.is_clean()) {
            warn!(
                "event=session_open module=session status=repaired people_ids={} dangling_refs={} duplicate_refs={} levels_clamped={} section_ids={} labels={}",
                report.people_ids_reassigned,
                report.dangling_refs_dropped,
                report.duplicate_refs_dropped,
                report.levels_clamped,
                report.section_ids_assigned,
                report.labels_assigned
            );
            self.notifications.push(Notification::warning(
                "Form data contained inconsistencies and was repaired on load",
            ));
        }
        info!(
            "event=session_open module=session status=ok populated={} sections={}",
            populated,
            self.document.sections().len()
        );

        self.touched = populated;
        self.scheduler.finish_load(populated);
        report
    }

    /// Applies an infallible mutation and schedules regeneration.
    pub fn edit<R>(&mut self, mutate: impl FnOnce(&mut DocumentState) -> R) -> R {
        let result = mutate(&mut self.document);
        self.mark_changed();
        result
    }

    /// Applies a fallible mutation. Regeneration is scheduled only on success.
    pub fn try_edit<T>(
        &mut self,
        mutate: impl FnOnce(&mut DocumentState, &dyn UniqueIdSource) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        match mutate(&mut self.document, self.ids.as_ref()) {
            Ok(value) => {
                self.mark_changed();
                Ok(value)
            }
            Err(err) => {
                log_rejected("custom", &err);
                Err(err)
            }
        }
    }

    /// Applies one edit command.
    pub fn apply(&mut self, edit: Edit) -> Result<(), EditError> {
        let op = edit.op_name();
        match self.document.apply(edit, self.ids.as_ref()) {
            Ok(()) => {
                self.mark_changed();
                Ok(())
            }
            Err(err) => {
                log_rejected(op, &err);
                Err(err)
            }
        }
    }

    /// Applies edits in order. Rejected edits are logged and skipped.
    pub fn apply_batch(&mut self, edits: impl IntoIterator<Item = Edit>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for edit in edits {
            match self.apply(edit) {
                Ok(()) => outcome.applied += 1,
                Err(_) => outcome.skipped += 1,
            }
        }
        outcome
    }

    /// Imports an image and appends it as a figure block.
    ///
    /// Returns the new label, or `Ok(None)` when the import was cancelled or
    /// failed (failures are reported as notifications).
    pub fn import_image(
        &mut self,
        section_index: usize,
        source: &Path,
    ) -> Result<Option<String>, EditError> {
        if self.document.sections().get(section_index).is_none() {
            let err = EditError::from(SectionTreeError::SectionNotFound(section_index));
            log_rejected("import_image", &err);
            return Err(err);
        }

        let relative = match self.importer.import_image(source, &self.project_root) {
            Ok(Some(relative)) => relative,
            Ok(None) => return Ok(None),
            Err(err) => {
                error!(
                    "event=image_import module=session status=error error={}",
                    err
                );
                self.notifications
                    .push(Notification::error(format!("Failed to import image: {err}")));
                return Ok(None);
            }
        };

        self.try_edit(|document, ids| document.add_image_block(section_index, &relative, ids))
            .map(Some)
    }

    /// Schedules a pass without changing the document.
    pub fn request_regeneration(&mut self) {
        self.mark_changed();
    }

    /// Whether the document holds loaded data or has been edited.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Runs at most one regeneration pass if one is due at `now`.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.scheduler.begin_pass(now) {
            return false;
        }
        self.run_pass();
        self.scheduler.finish_pass();
        true
    }

    /// Runs passes until no change is outstanding, ignoring the quiet period.
    ///
    /// Returns the number of passes run.
    pub fn settle(&mut self) -> usize {
        let mut passes = 0;
        while self.scheduler.begin_pass_immediately() {
            self.run_pass();
            self.scheduler.finish_pass();
            passes += 1;
        }
        passes
    }

    /// Flushes outstanding changes and saves the final snapshot.
    ///
    /// An untouched session leaves the project as it found it.
    pub fn close(&mut self) {
        self.settle();
        if !self.touched {
            info!("event=session_close module=session status=skipped reason=untouched");
            return;
        }
        let snapshot = self.document.to_snapshot();
        if let Err(err) = self.store.save(&snapshot) {
            error!(
                "event=session_close module=session status=error error_code=save_failed error={}",
                err
            );
            self.notifications
                .push(Notification::error(format!("Failed to save form data: {err}")));
            return;
        }
        info!("event=session_close module=session status=ok");
    }

    /// Drains pending notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn mark_changed(&mut self) {
        self.touched = true;
        self.scheduler.notify_changed();
    }

    fn run_pass(&mut self) {
        let started_at = Instant::now();
        let snapshot = self.document.to_snapshot();
        let mut failed = false;

        if let Err(err) = self.generator.generate(&snapshot) {
            failed = true;
            error!(
                "event=regenerate module=session status=error stage=generate error={}",
                err
            );
            self.notifications
                .push(Notification::error(format!("Failed to generate document: {err}")));
        }
        if let Err(err) = self.store.save(&snapshot) {
            failed = true;
            error!(
                "event=regenerate module=session status=error stage=save error={}",
                err
            );
            self.notifications
                .push(Notification::error(format!("Failed to save form data: {err}")));
        }

        if !failed {
            info!(
                "event=regenerate module=session status=ok pass={} duration_ms={}",
                self.scheduler.passes_run(),
                started_at.elapsed().as_millis()
            );
        }
    }
}

fn log_rejected(op: &str, err: &EditError) {
    match err.kind() {
        EditErrorKind::InvalidReference => debug!(
            "event=edit module=session status=skipped op={} kind=invalid_reference error={}",
            op, err
        ),
        EditErrorKind::DepthExceeded => warn!(
            "event=edit module=session status=rejected op={} kind=depth_exceeded error={}",
            op, err
        ),
        EditErrorKind::Rejected => warn!(
            "event=edit module=session status=rejected op={} kind=rejected error={}",
            op, err
        ),
    }
}
