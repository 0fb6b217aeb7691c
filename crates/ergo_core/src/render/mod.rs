//! Document generation.
//!
//! # Responsibility
//! - Write the generated entry document and section files into a project.
//!
//! # Invariants
//! - Generation reads only the snapshot; it never mutates document state.
//! - Section files are written before the entry document that includes them.

pub mod typst;

use crate::collab::{GenerateError, Generator};
use crate::config::SessionConfig;
use crate::model::snapshot::DocumentSnapshot;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Writes `versatile-apa` Typst sources into a project directory.
#[derive(Debug, Clone)]
pub struct TypstGenerator {
    project_root: PathBuf,
    config: SessionConfig,
}

impl TypstGenerator {
    pub fn new(project_root: impl Into<PathBuf>, config: SessionConfig) -> Self {
        Self {
            project_root: project_root.into(),
            config,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn write_all(&self, snapshot: &DocumentSnapshot) -> Result<usize, GenerateError> {
        let sections_dir = self.config.sections_path(&self.project_root);
        std::fs::create_dir_all(&sections_dir).map_err(|source| GenerateError::Io {
            path: sections_dir.clone(),
            source,
        })?;

        let files = typst::render_section_files(snapshot, &self.config);
        for file in &files {
            write_file(&sections_dir.join(format!("{}.typ", file.id)), &file.content)?;
        }

        let main = typst::render_main(snapshot, &self.config);
        write_file(&self.config.main_path(&self.project_root), &main)?;
        Ok(files.len())
    }
}

impl Generator for TypstGenerator {
    fn generate(&mut self, snapshot: &DocumentSnapshot) -> Result<(), GenerateError> {
        let started_at = Instant::now();
        match self.write_all(snapshot) {
            Ok(section_files) => {
                info!(
                    "event=generate module=render status=ok section_files={} duration_ms={}",
                    section_files,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=generate module=render status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), GenerateError> {
    std::fs::write(path, content).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::TypstGenerator;
    use crate::collab::{GenerateError, Generator};
    use crate::config::SessionConfig;
    use crate::model::section::ContentBlock;
    use crate::model::snapshot::{DocumentSnapshot, SectionRecord};

    #[test]
    fn generate_writes_main_and_section_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = TypstGenerator::new(dir.path(), SessionConfig::default());
        let snapshot = DocumentSnapshot {
            title: "Paper".to_string(),
            sections: vec![SectionRecord {
                id: "sec-1".to_string(),
                title: "Intro".to_string(),
                blocks: Some(vec![ContentBlock::text("Hello.")]),
                ..SectionRecord::default()
            }],
            ..DocumentSnapshot::default()
        };

        generator.generate(&snapshot).unwrap();

        let main = std::fs::read_to_string(dir.path().join("main.typ")).unwrap();
        assert!(main.contains("#let doc-title = [Paper]"));
        assert!(main.contains("#include \"sections/sec-1.typ\""));
        let section = std::fs::read_to_string(dir.path().join("sections/sec-1.typ")).unwrap();
        assert!(section.ends_with("= Intro\n\nHello."));
    }

    #[test]
    fn generate_reports_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let mut generator = TypstGenerator::new(&blocker, SessionConfig::default());

        let err = generator.generate(&DocumentSnapshot::default()).unwrap_err();
        assert!(matches!(err, GenerateError::Io { .. }));
    }
}
