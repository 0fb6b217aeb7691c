//! Section and content-block domain model.
//!
//! # Responsibility
//! - Define the leveled section record stored in the flat section sequence.
//! - Define the content-block union and the legacy single-string body.
//!
//! # Invariants
//! - `SectionLevel` can only hold values in `[MIN_SECTION_LEVEL, MAX_SECTION_LEVEL]`.
//! - `Section::id` is generated once and never rewritten.
//! - A `SectionBody::Legacy` body only ever migrates to `SectionBody::Blocks`,
//!   never back.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static SECTION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid section id regex"));
static IMAGE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_:.-]*$").expect("valid image label regex"));

/// Shallowest heading level.
pub const MIN_SECTION_LEVEL: u8 = 1;
/// Deepest heading level accepted by the document template.
pub const MAX_SECTION_LEVEL: u8 = 5;

/// Stable section identifier, also used as the generated file stem.
pub type SectionId = String;

/// Heading depth of a section, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "i64")]
pub struct SectionLevel(u8);

impl SectionLevel {
    /// Level of top-level sections.
    pub const TOP: Self = Self(MIN_SECTION_LEVEL);
    /// Deepest allowed level.
    pub const DEEPEST: Self = Self(MAX_SECTION_LEVEL);

    /// Returns a level when `value` is in range.
    pub fn new(value: u8) -> Option<Self> {
        (MIN_SECTION_LEVEL..=MAX_SECTION_LEVEL)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Clamps an arbitrary persisted value into the allowed range.
    pub fn clamped(value: i64) -> Self {
        let clamped = value.clamp(i64::from(MIN_SECTION_LEVEL), i64::from(MAX_SECTION_LEVEL));
        Self(clamped as u8)
    }

    /// Raw numeric level.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Level of a direct child, or `None` when already at the deepest level.
    pub fn child(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }
}

impl Default for SectionLevel {
    fn default() -> Self {
        Self::TOP
    }
}

impl From<i64> for SectionLevel {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<SectionLevel> for u8 {
    fn from(value: SectionLevel) -> Self {
        value.0
    }
}

impl Display for SectionLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Figure block payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageBlock {
    /// Image path relative to the project root, `/`-separated.
    pub path: String,
    /// Figure caption text.
    pub caption: String,
    /// Figure note rendered below the image.
    pub note: String,
    /// Cross-reference label, unique within the document.
    pub label: String,
}

/// One unit of section content.
///
/// Serialized with a `type` tag (`text` or `image`) to match the project
/// form-data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Prose paragraph(s).
    Text {
        #[serde(default)]
        content: String,
    },
    /// Figure with caption and note.
    Image(ImageBlock),
}

impl ContentBlock {
    /// Creates a text block.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Returns image payload when this is an image block.
    pub fn as_image(&self) -> Option<&ImageBlock> {
        match self {
            Self::Image(image) => Some(image),
            Self::Text { .. } => None,
        }
    }
}

/// Section content, either the legacy single string or a block list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    /// Pre-blocks representation: exactly one implicit text block.
    Legacy(String),
    /// Authoritative ordered block list (may be empty).
    Blocks(Vec<ContentBlock>),
}

impl SectionBody {
    /// Body of a fresh section: one empty text block.
    pub fn single_empty_text() -> Self {
        Self::Blocks(vec![ContentBlock::text("")])
    }

    /// Whether this body still uses the legacy representation.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Number of logical blocks (a legacy body counts as one).
    pub fn block_count(&self) -> usize {
        match self {
            Self::Legacy(_) => 1,
            Self::Blocks(blocks) => blocks.len(),
        }
    }

    /// Iterates image blocks of this body.
    pub fn images(&self) -> impl Iterator<Item = &ImageBlock> {
        let blocks: &[ContentBlock] = match self {
            Self::Legacy(_) => &[],
            Self::Blocks(blocks) => blocks,
        };
        blocks.iter().filter_map(ContentBlock::as_image)
    }

    /// Migrates a legacy body to blocks and returns the block list.
    ///
    /// Called before every structural block edit.
    pub fn blocks_mut(&mut self) -> &mut Vec<ContentBlock> {
        if let Self::Legacy(content) = self {
            let content = std::mem::take(content);
            *self = Self::Blocks(vec![ContentBlock::text(content)]);
        }
        let Self::Blocks(blocks) = self else {
            unreachable!("legacy body was migrated above");
        };
        blocks
    }
}

/// One node of the heading hierarchy, stored in a flat leveled sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Stable identifier generated at creation.
    pub id: SectionId,
    /// Heading text. Mirrors the document title for the implicit introduction.
    pub title: String,
    /// Heading depth.
    pub level: SectionLevel,
    /// Section content.
    pub body: SectionBody,
    /// Marks the synthetic introduction section at index 0.
    pub is_implicit: bool,
}

impl Section {
    /// Creates an untitled section with one empty text block.
    pub fn new(level: SectionLevel) -> Self {
        Self {
            id: new_section_id(),
            title: String::new(),
            level,
            body: SectionBody::single_empty_text(),
            is_implicit: false,
        }
    }

    /// Creates the synthetic introduction section mirroring `document_title`.
    pub fn implicit_introduction(document_title: &str) -> Self {
        Self {
            title: document_title.to_string(),
            is_implicit: true,
            ..Self::new(SectionLevel::TOP)
        }
    }
}

/// Generates a fresh section id that is safe to use as a file stem.
pub fn new_section_id() -> SectionId {
    format!("sec-{}", Uuid::new_v4().simple())
}

/// Whether `id` can be used verbatim as a file stem under the sections dir.
pub fn is_valid_section_id(id: &str) -> bool {
    SECTION_ID_RE.is_match(id)
}

/// Whether `label` can be written as a Typst `<label>` as-is.
pub fn is_valid_image_label(label: &str) -> bool {
    IMAGE_LABEL_RE.is_match(label)
}
