//! Session configuration.
//!
//! # Responsibility
//! - Name the project layout (generated files, images, form data, history db).
//! - Carry generator and scheduler tuning with serde-friendly defaults.
//!
//! # Invariants
//! - Every path field is relative to the project root.
//! - `SessionConfig::default()` reproduces the layout of existing projects.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Entry document written by the generator.
pub const DEFAULT_MAIN_FILE: &str = "main.typ";
/// Directory holding one generated file per top-level section.
pub const DEFAULT_SECTIONS_DIR: &str = "sections";
/// Directory images are imported into.
pub const DEFAULT_IMAGES_DIR: &str = "images";
/// Form-data file used by the JSON store.
pub const DEFAULT_FORM_DATA_FILE: &str = "form_data.json";
/// Snapshot history database used by the SQLite store.
pub const DEFAULT_SNAPSHOT_DB: &str = ".ergo/snapshots.sqlite3";
/// Template package imported by the generated entry document.
pub const DEFAULT_TEMPLATE_PACKAGE: &str = "@preview/versatile-apa:7.1.5";
/// Bibliography file referenced by the generated entry document.
pub const DEFAULT_BIBLIOGRAPHY_FILE: &str = "bibliography/ref.bib";
/// Citation style referenced by the generated entry document.
pub const DEFAULT_CSL_FILE: &str = "csl/apa.csl";

/// Persistence backend used for form data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// `form_data.json` in the project root.
    #[default]
    Json,
    /// Revision history in a SQLite file.
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Regeneration scheduling options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Settle window in milliseconds.
    ///
    /// A pending check only runs once no change has arrived for this long.
    /// Zero runs checks at the next yield point.
    pub quiet_period_ms: u64,
}

impl SchedulerConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

/// Per-project editor session options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub main_file: String,
    pub sections_dir: String,
    pub images_dir: String,
    pub form_data_file: String,
    pub snapshot_db: String,
    pub template_package: String,
    pub bibliography_file: String,
    pub csl_file: String,
    pub store: StoreBackend,
    pub scheduler: SchedulerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            main_file: DEFAULT_MAIN_FILE.to_string(),
            sections_dir: DEFAULT_SECTIONS_DIR.to_string(),
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
            form_data_file: DEFAULT_FORM_DATA_FILE.to_string(),
            snapshot_db: DEFAULT_SNAPSHOT_DB.to_string(),
            template_package: DEFAULT_TEMPLATE_PACKAGE.to_string(),
            bibliography_file: DEFAULT_BIBLIOGRAPHY_FILE.to_string(),
            csl_file: DEFAULT_CSL_FILE.to_string(),
            store: StoreBackend::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn main_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.main_file)
    }

    pub fn sections_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.sections_dir)
    }

    pub fn images_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.images_dir)
    }

    pub fn form_data_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.form_data_file)
    }

    pub fn snapshot_db_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.snapshot_db)
    }
}

#[cfg(test)]
mod tests {
    use super::{SchedulerConfig, SessionConfig, StoreBackend};
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn defaults_match_project_layout() {
        let config = SessionConfig::default();
        let root = Path::new("/projects/paper");
        assert_eq!(config.main_path(root), root.join("main.typ"));
        assert_eq!(config.form_data_path(root), root.join("form_data.json"));
        assert_eq!(config.scheduler.quiet_period(), Duration::ZERO);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"scheduler": {"quiet_period_ms": 250}}"#).unwrap();
        assert_eq!(
            config.scheduler,
            SchedulerConfig {
                quiet_period_ms: 250
            }
        );
        assert_eq!(config.images_dir, "images");
        assert_eq!(config.store, StoreBackend::Json);
    }

    #[test]
    fn store_backend_uses_lowercase_names() {
        let config: SessionConfig = serde_json::from_str(r#"{"store": "sqlite"}"#).unwrap();
        assert_eq!(config.store, StoreBackend::Sqlite);
        assert_eq!(config.store.as_str(), "sqlite");
    }
}
