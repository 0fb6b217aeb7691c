//! Serialized document snapshot exchanged with persistence and generators.
//!
//! # Responsibility
//! - Define the wire shape of a complete document (the project form-data file).
//! - Default every absent field so partial or older files still load.
//!
//! # Invariants
//! - A snapshot is plain data: it carries no id counters or derived flags.
//! - `DocumentSnapshot::default()` is the "empty" snapshot; loading it must
//!   not be treated as populated data.

use crate::model::formatting::{
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_LANGUAGE, DEFAULT_PAPER_SIZE, DEFAULT_REGION,
};
use crate::model::people::{Affiliation, Author};
use crate::model::section::ContentBlock;
use serde::{Deserialize, Serialize};

/// Wire form of one section.
///
/// Exactly one of `content` (legacy) and `blocks` is written. Readers accept
/// either, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionRecord {
    pub id: String,
    pub title: String,
    /// Raw persisted level; clamped into range on load.
    pub level: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<ContentBlock>>,
    #[serde(rename = "isImplicit", skip_serializing_if = "std::ops::Not::not")]
    pub is_implicit: bool,
}

impl Default for SectionRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            level: 1,
            content: None,
            blocks: None,
            is_implicit: false,
        }
    }
}

/// Complete document snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSnapshot {
    pub title: String,
    pub authors: Vec<Author>,
    pub affiliations: Vec<Affiliation>,
    pub sections: Vec<SectionRecord>,
    pub running_head: String,
    pub author_notes: String,
    pub course: String,
    pub instructor: String,
    pub due_date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Comma-separated, stored verbatim.
    pub keywords: String,
    pub font_family: String,
    pub font_size: u32,
    pub paper_size: String,
    pub region: String,
    pub language: String,
    pub implicit_intro: bool,
    pub abstract_as_desc: bool,
}

impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self {
            title: String::new(),
            authors: Vec::new(),
            affiliations: Vec::new(),
            sections: Vec::new(),
            running_head: String::new(),
            author_notes: String::new(),
            course: String::new(),
            instructor: String::new(),
            due_date: String::new(),
            abstract_text: String::new(),
            keywords: String::new(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            paper_size: DEFAULT_PAPER_SIZE.to_string(),
            region: DEFAULT_REGION.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            implicit_intro: false,
            abstract_as_desc: false,
        }
    }
}

impl DocumentSnapshot {
    /// Whether this snapshot carries no user data at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
