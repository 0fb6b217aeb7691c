//! Filesystem image importer.
//!
//! # Responsibility
//! - Copy a user-picked image into the project's image directory.
//!
//! # Invariants
//! - Existing project files are never overwritten.
//! - Returned paths are project-relative and `/`-separated.

use crate::collab::{ImageImporter, ImportError};
use log::info;
use std::path::Path;

/// Copies images into `<project>/<images_dir>/`.
#[derive(Debug, Clone)]
pub struct FsImageImporter {
    images_dir: String,
}

impl FsImageImporter {
    /// `images_dir` is relative to the project root.
    pub fn new(images_dir: impl Into<String>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }
}

impl ImageImporter for FsImageImporter {
    fn import_image(
        &mut self,
        source: &Path,
        project_root: &Path,
    ) -> Result<Option<String>, ImportError> {
        if source.as_os_str().is_empty() {
            return Ok(None);
        }
        if !source.is_file() {
            return Err(ImportError::SourceMissing(source.to_path_buf()));
        }

        let target_dir = project_root.join(&self.images_dir);
        std::fs::create_dir_all(&target_dir).map_err(|source| ImportError::Io {
            path: target_dir.clone(),
            source,
        })?;

        let file_name = free_file_name(&target_dir, source);
        let target = target_dir.join(&file_name);
        std::fs::copy(source, &target).map_err(|err| ImportError::Io {
            path: target.clone(),
            source: err,
        })?;

        let relative = format!("{}/{}", self.images_dir.trim_end_matches(['/', '\\']), file_name)
            .replace('\\', "/");
        info!("event=image_import module=import status=ok path={relative}");
        Ok(Some(relative))
    }
}

/// Picks `name.ext`, then `name-2.ext`, `name-3.ext`, ... until unused.
fn free_file_name(target_dir: &Path, source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    let extension = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut candidate = format!("{stem}{extension}");
    let mut suffix = 2;
    while exists(&target_dir.join(&candidate)) {
        candidate = format!("{stem}-{suffix}{extension}");
        suffix += 1;
    }
    candidate
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::FsImageImporter;
    use crate::collab::{ImageImporter, ImportError};
    use std::path::Path;

    #[test]
    fn empty_source_is_a_cancel() {
        let project = tempfile::tempdir().unwrap();
        let mut importer = FsImageImporter::new("images");
        assert_eq!(importer.import_image(Path::new(""), project.path()).unwrap(), None);
    }

    #[test]
    fn import_copies_with_non_colliding_names() {
        let project = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let source = outside.path().join("chart.png");
        std::fs::write(&source, b"png").unwrap();
        let mut importer = FsImageImporter::new("images");

        let first = importer.import_image(&source, project.path()).unwrap();
        let second = importer.import_image(&source, project.path()).unwrap();

        assert_eq!(first.as_deref(), Some("images/chart.png"));
        assert_eq!(second.as_deref(), Some("images/chart-2.png"));
        assert!(project.path().join("images/chart-2.png").is_file());
    }

    #[test]
    fn missing_source_is_reported() {
        let project = tempfile::tempdir().unwrap();
        let mut importer = FsImageImporter::new("images");
        let err = importer
            .import_image(&project.path().join("nope.png"), project.path())
            .unwrap_err();
        assert!(matches!(err, ImportError::SourceMissing(_)));
    }
}
