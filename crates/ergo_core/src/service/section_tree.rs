//! Leveled section hierarchy stored as a flat sequence.
//!
//! # Responsibility
//! - Add, remove and reorder sections while keeping subtrees contiguous.
//! - Edit per-section content blocks, migrating legacy bodies on first
//!   structural edit.
//! - Own the implicit introduction section at index 0.
//!
//! # Invariants
//! - A section's descendants are the maximal run of following sections with
//!   a strictly greater level.
//! - Levels stay within `1..=5`; deeper subsections are rejected.
//! - Only index 0 may hold an implicit section; it has no descendants, its
//!   title mirrors the document title, and it never moves.
//! - Failed operations leave the sequence unchanged.

use crate::model::section::{ContentBlock, ImageBlock, Section, SectionBody, SectionLevel};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Component, Path};

/// Errors from section tree edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionTreeError {
    /// Section index is out of bounds.
    SectionNotFound(usize),
    /// Block index is out of bounds for an existing section.
    BlockNotFound { section: usize, block: usize },
    /// Block exists but has a different kind than the edit expects.
    BlockKindMismatch { section: usize, block: usize },
    /// Parent section is already at the deepest level.
    DepthExceeded { parent: usize, level: u8 },
    /// Direct structural or title edit of the implicit introduction.
    ImplicitSection(usize),
    /// No sibling to swap with in the requested direction.
    NoSibling(usize),
    /// Image path is blank, absolute, or escapes the project root.
    InvalidImagePath(String),
}

impl SectionTreeError {
    /// Whether this error is a stale index rather than a rejected request.
    pub fn is_invalid_reference(&self) -> bool {
        matches!(
            self,
            Self::SectionNotFound(_) | Self::BlockNotFound { .. } | Self::BlockKindMismatch { .. }
        )
    }
}

impl Display for SectionTreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SectionNotFound(index) => write!(f, "section index out of range: {index}"),
            Self::BlockNotFound { section, block } => {
                write!(f, "block {block} out of range in section {section}")
            }
            Self::BlockKindMismatch { section, block } => {
                write!(f, "block {block} in section {section} has a different kind")
            }
            Self::DepthExceeded { parent, level } => write!(
                f,
                "section {parent} is already at level {level}; subsections are not allowed"
            ),
            Self::ImplicitSection(index) => {
                write!(f, "section {index} is the implicit introduction")
            }
            Self::NoSibling(index) => write!(f, "section {index} has no sibling in that direction"),
            Self::InvalidImagePath(path) => write!(f, "invalid project-relative image path: `{path}`"),
        }
    }
}

impl Error for SectionTreeError {}

/// Ordered, leveled section sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTree {
    sections: Vec<Section>,
}

impl SectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a persisted sequence.
    ///
    /// Implicit flags anywhere but index 0 are cleared.
    pub fn from_sections(mut sections: Vec<Section>) -> Self {
        for section in sections.iter_mut().skip(1) {
            section.is_implicit = false;
        }
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Whether index 0 holds the implicit introduction.
    pub fn has_implicit_introduction(&self) -> bool {
        self.sections.first().is_some_and(|s| s.is_implicit)
    }

    /// Exclusive end of the subtree rooted at `index`.
    ///
    /// Returns `None` for a stale index.
    pub fn subtree_end(&self, index: usize) -> Option<usize> {
        let root = self.sections.get(index)?;
        if root.is_implicit {
            return Some(index + 1);
        }
        let end = self.sections[index + 1..]
            .iter()
            .position(|s| s.level <= root.level)
            .map_or(self.sections.len(), |offset| index + 1 + offset);
        Some(end)
    }

    /// Number of direct and transitive descendants of `index`.
    pub fn descendant_count(&self, index: usize) -> Option<usize> {
        self.subtree_end(index).map(|end| end - index - 1)
    }

    /// Appends a top-level section with one empty text block.
    pub fn add_section(&mut self) -> Section {
        let section = Section::new(SectionLevel::TOP);
        self.sections.push(section.clone());
        section
    }

    /// Inserts a child at the end of the parent's existing child run.
    pub fn add_subsection(&mut self, parent_index: usize) -> Result<Section, SectionTreeError> {
        let parent = self
            .sections
            .get(parent_index)
            .ok_or(SectionTreeError::SectionNotFound(parent_index))?;
        if parent.is_implicit {
            return Err(SectionTreeError::ImplicitSection(parent_index));
        }
        let level = parent.level.child().ok_or(SectionTreeError::DepthExceeded {
            parent: parent_index,
            level: parent.level.get(),
        })?;

        let insert_at = self
            .subtree_end(parent_index)
            .ok_or(SectionTreeError::SectionNotFound(parent_index))?;
        let section = Section::new(level);
        self.sections.insert(insert_at, section.clone());
        Ok(section)
    }

    /// Removes a section together with its whole descendant run.
    ///
    /// Returns the removed sections in their original order.
    pub fn remove_section(&mut self, index: usize) -> Result<Vec<Section>, SectionTreeError> {
        let section = self
            .sections
            .get(index)
            .ok_or(SectionTreeError::SectionNotFound(index))?;
        if section.is_implicit {
            return Err(SectionTreeError::ImplicitSection(index));
        }
        let end = self
            .subtree_end(index)
            .ok_or(SectionTreeError::SectionNotFound(index))?;
        Ok(self.sections.drain(index..end).collect())
    }

    /// Retitles a regular section.
    pub fn set_section_title(
        &mut self,
        index: usize,
        title: impl Into<String>,
    ) -> Result<(), SectionTreeError> {
        let section = self.regular_section_mut(index)?;
        section.title = title.into();
        Ok(())
    }

    /// Swaps a subtree with the previous sibling subtree.
    ///
    /// Returns the new index of the moved section.
    pub fn move_section_up(&mut self, index: usize) -> Result<usize, SectionTreeError> {
        let level = self.regular_section_mut(index)?.level;
        let end = self
            .subtree_end(index)
            .ok_or(SectionTreeError::SectionNotFound(index))?;

        let sibling_start = self.sections[..index]
            .iter()
            .rposition(|s| s.level <= level)
            .filter(|&start| {
                let candidate = &self.sections[start];
                candidate.level == level && !candidate.is_implicit
            })
            .ok_or(SectionTreeError::NoSibling(index))?;

        self.sections[sibling_start..end].rotate_left(index - sibling_start);
        Ok(sibling_start)
    }

    /// Swaps a subtree with the next sibling subtree.
    ///
    /// Returns the new index of the moved section.
    pub fn move_section_down(&mut self, index: usize) -> Result<usize, SectionTreeError> {
        let level = self.regular_section_mut(index)?.level;
        let end = self
            .subtree_end(index)
            .ok_or(SectionTreeError::SectionNotFound(index))?;
        match self.sections.get(end) {
            Some(next) if next.level == level => {}
            _ => return Err(SectionTreeError::NoSibling(index)),
        }
        let sibling_end = self
            .subtree_end(end)
            .ok_or(SectionTreeError::NoSibling(index))?;

        self.sections[index..sibling_end].rotate_left(end - index);
        Ok(index + (sibling_end - end))
    }

    /// Appends an empty text block. Returns the new block index.
    pub fn add_text_block(&mut self, section_index: usize) -> Result<usize, SectionTreeError> {
        let blocks = self.section_mut(section_index)?.body.blocks_mut();
        blocks.push(ContentBlock::text(""));
        Ok(blocks.len() - 1)
    }

    /// Appends an image block for a project-relative `path`.
    ///
    /// `label` must already be unique within the document.
    pub fn add_image_block(
        &mut self,
        section_index: usize,
        path: &str,
        label: String,
    ) -> Result<String, SectionTreeError> {
        if section_index >= self.sections.len() {
            return Err(SectionTreeError::SectionNotFound(section_index));
        }
        let path = normalize_relative_path(path)
            .ok_or_else(|| SectionTreeError::InvalidImagePath(path.to_string()))?;

        let blocks = self.section_mut(section_index)?.body.blocks_mut();
        blocks.push(ContentBlock::Image(ImageBlock {
            path,
            caption: String::new(),
            note: String::new(),
            label: label.clone(),
        }));
        Ok(label)
    }

    /// Removes one block. An out-of-range `block_index` is a no-op.
    pub fn remove_block(
        &mut self,
        section_index: usize,
        block_index: usize,
    ) -> Result<Option<ContentBlock>, SectionTreeError> {
        let blocks = self.section_mut(section_index)?.body.blocks_mut();
        if block_index >= blocks.len() {
            return Ok(None);
        }
        Ok(Some(blocks.remove(block_index)))
    }

    /// Replaces the text of one text block.
    ///
    /// Editing block 0 of a legacy body keeps the legacy representation.
    pub fn set_text_block(
        &mut self,
        section_index: usize,
        block_index: usize,
        text: impl Into<String>,
    ) -> Result<(), SectionTreeError> {
        let not_found = SectionTreeError::BlockNotFound {
            section: section_index,
            block: block_index,
        };
        match &mut self.section_mut(section_index)?.body {
            SectionBody::Legacy(content) if block_index == 0 => {
                *content = text.into();
                Ok(())
            }
            SectionBody::Legacy(_) => Err(not_found),
            SectionBody::Blocks(blocks) => match blocks.get_mut(block_index) {
                Some(ContentBlock::Text { content }) => {
                    *content = text.into();
                    Ok(())
                }
                Some(ContentBlock::Image(_)) => Err(SectionTreeError::BlockKindMismatch {
                    section: section_index,
                    block: block_index,
                }),
                None => Err(not_found),
            },
        }
    }

    /// Replaces an image block's caption.
    pub fn set_image_caption(
        &mut self,
        section_index: usize,
        block_index: usize,
        caption: impl Into<String>,
    ) -> Result<(), SectionTreeError> {
        self.image_mut(section_index, block_index)?.caption = caption.into();
        Ok(())
    }

    /// Replaces an image block's note.
    pub fn set_image_note(
        &mut self,
        section_index: usize,
        block_index: usize,
        note: impl Into<String>,
    ) -> Result<(), SectionTreeError> {
        self.image_mut(section_index, block_index)?.note = note.into();
        Ok(())
    }

    /// Iterates every image label in document order.
    pub fn image_labels(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.body.images())
            .map(|image| image.label.as_str())
    }

    /// Inserts or removes the implicit introduction at index 0.
    ///
    /// Returns whether the sequence changed; repeated identical calls are
    /// no-ops.
    pub(crate) fn set_implicit_introduction(&mut self, enabled: bool, document_title: &str) -> bool {
        match (enabled, self.has_implicit_introduction()) {
            (true, false) => {
                self.sections
                    .insert(0, Section::implicit_introduction(document_title));
                true
            }
            (false, true) => {
                self.sections.remove(0);
                true
            }
            _ => false,
        }
    }

    /// Mirrors `document_title` into the implicit introduction, if present.
    pub(crate) fn sync_implicit_title(&mut self, document_title: &str) -> bool {
        match self.sections.first_mut() {
            Some(section) if section.is_implicit && section.title != document_title => {
                section.title = document_title.to_string();
                true
            }
            _ => false,
        }
    }

    /// Mutable access used by load-time repair.
    pub(crate) fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections
    }

    fn section_mut(&mut self, index: usize) -> Result<&mut Section, SectionTreeError> {
        self.sections
            .get_mut(index)
            .ok_or(SectionTreeError::SectionNotFound(index))
    }

    fn regular_section_mut(&mut self, index: usize) -> Result<&mut Section, SectionTreeError> {
        let section = self.section_mut(index)?;
        if section.is_implicit {
            return Err(SectionTreeError::ImplicitSection(index));
        }
        Ok(section)
    }

    fn image_mut(
        &mut self,
        section_index: usize,
        block_index: usize,
    ) -> Result<&mut ImageBlock, SectionTreeError> {
        let mismatch = SectionTreeError::BlockKindMismatch {
            section: section_index,
            block: block_index,
        };
        let not_found = SectionTreeError::BlockNotFound {
            section: section_index,
            block: block_index,
        };
        match &mut self.section_mut(section_index)?.body {
            SectionBody::Legacy(_) if block_index == 0 => Err(mismatch),
            SectionBody::Legacy(_) => Err(not_found),
            SectionBody::Blocks(blocks) => match blocks.get_mut(block_index) {
                Some(ContentBlock::Image(image)) => Ok(image),
                Some(ContentBlock::Text { .. }) => Err(mismatch),
                None => Err(not_found),
            },
        }
    }
}

/// Validates and normalizes a project-relative path to `/` separators.
///
/// Returns `None` for blank, absolute, or parent-escaping paths.
pub fn normalize_relative_path(path: &str) -> Option<String> {
    let normalized = path.trim().replace('\\', "/");
    if normalized.is_empty() || normalized.starts_with('/') {
        return None;
    }
    let escapes = Path::new(&normalized).components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return None;
    }
    Some(normalized)
}
