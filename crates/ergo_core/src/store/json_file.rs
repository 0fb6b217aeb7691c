//! Form-data JSON file store.

use crate::collab::{PersistenceAdapter, StoreError};
use crate::model::snapshot::DocumentSnapshot;
use log::{error, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores the snapshot as pretty-printed JSON in one file.
///
/// Saves go through a sibling temp file and a rename so a crash mid-write
/// never truncates the previous form data.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PersistenceAdapter for JsonFileStore {
    fn load(&mut self) -> Result<Option<DocumentSnapshot>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("event=store_load module=store status=ok backend=json found=false");
                return Ok(None);
            }
            Err(err) => return Err(self.io_error(err)),
        };
        let snapshot: DocumentSnapshot = serde_json::from_str(&raw).map_err(|err| {
            error!(
                "event=store_load module=store status=error backend=json error_code=invalid_json error={}",
                err
            );
            StoreError::from(err)
        })?;
        info!(
            "event=store_load module=store status=ok backend=json found=true sections={}",
            snapshot.sections.len()
        );
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &DocumentSnapshot) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, body).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        std::fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))?;
        info!("event=store_save module=store status=ok backend=json");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileStore;
    use crate::collab::{PersistenceAdapter, StoreError};
    use crate::model::snapshot::DocumentSnapshot;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("form_data.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_returns_same_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("form_data.json"));
        let snapshot = DocumentSnapshot {
            title: "Saved".to_string(),
            keywords: "a, b".to_string(),
            ..DocumentSnapshot::default()
        };

        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert!(!dir.path().join("form_data.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form_data.json");
        std::fs::write(&path, "{not json").unwrap();
        let mut store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }
}
