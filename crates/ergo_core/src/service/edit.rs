//! Form edit commands.
//!
//! # Responsibility
//! - Describe every user-facing document edit as plain data so a UI bridge
//!   can queue them and a session can apply them in order.
//!
//! # Invariants
//! - Index-addressed edits name positions at the time they are applied, not
//!   when they were issued; stale positions are rejected, never clamped.

use crate::model::people::AffiliationId;
use serde::{Deserialize, Serialize};

/// One document edit.
///
/// Serialized with an `op` tag, e.g. `{"op": "remove_section", "index": 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    SetTitle { value: String },
    SetRunningHead { value: String },
    SetAuthorNotes { value: String },
    SetCourse { value: String },
    SetInstructor { value: String },
    SetDueDate { value: String },
    SetAbstract { value: String },
    SetKeywords { value: String },
    SetFontFamily { value: String },
    SetFontSize { value: u32 },
    SetPaperSize { value: String },
    SetRegion { value: String },
    SetLanguage { value: String },
    SetImplicitIntroduction { enabled: bool },
    SetAbstractAsDescription { enabled: bool },

    AddAffiliation,
    RemoveAffiliation { index: usize },
    SetAffiliationName { index: usize, name: String },
    AddAuthor,
    RemoveAuthor { index: usize },
    SetAuthorName { index: usize, name: String },
    SetAuthorOrcid { index: usize, orcid: String },
    SetAuthorAffiliation {
        author_index: usize,
        affiliation_id: AffiliationId,
        present: bool,
    },

    AddSection,
    AddSubsection { parent_index: usize },
    RemoveSection { index: usize },
    SetSectionTitle { index: usize, title: String },
    MoveSectionUp { index: usize },
    MoveSectionDown { index: usize },

    AddTextBlock { section_index: usize },
    /// `path` must already be project-relative; importing is done by the
    /// session before this edit is built.
    AddImageBlock { section_index: usize, path: String },
    RemoveBlock { section_index: usize, block_index: usize },
    SetTextBlock {
        section_index: usize,
        block_index: usize,
        content: String,
    },
    SetImageCaption {
        section_index: usize,
        block_index: usize,
        caption: String,
    },
    SetImageNote {
        section_index: usize,
        block_index: usize,
        note: String,
    },
}

impl Edit {
    /// Stable snake_case operation name used in log events.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::SetTitle { .. } => "set_title",
            Self::SetRunningHead { .. } => "set_running_head",
            Self::SetAuthorNotes { .. } => "set_author_notes",
            Self::SetCourse { .. } => "set_course",
            Self::SetInstructor { .. } => "set_instructor",
            Self::SetDueDate { .. } => "set_due_date",
            Self::SetAbstract { .. } => "set_abstract",
            Self::SetKeywords { .. } => "set_keywords",
            Self::SetFontFamily { .. } => "set_font_family",
            Self::SetFontSize { .. } => "set_font_size",
            Self::SetPaperSize { .. } => "set_paper_size",
            Self::SetRegion { .. } => "set_region",
            Self::SetLanguage { .. } => "set_language",
            Self::SetImplicitIntroduction { .. } => "set_implicit_introduction",
            Self::SetAbstractAsDescription { .. } => "set_abstract_as_description",
            Self::AddAffiliation => "add_affiliation",
            Self::RemoveAffiliation { .. } => "remove_affiliation",
            Self::SetAffiliationName { .. } => "set_affiliation_name",
            Self::AddAuthor => "add_author",
            Self::RemoveAuthor { .. } => "remove_author",
            Self::SetAuthorName { .. } => "set_author_name",
            Self::SetAuthorOrcid { .. } => "set_author_orcid",
            Self::SetAuthorAffiliation { .. } => "set_author_affiliation",
            Self::AddSection => "add_section",
            Self::AddSubsection { .. } => "add_subsection",
            Self::RemoveSection { .. } => "remove_section",
            Self::SetSectionTitle { .. } => "set_section_title",
            Self::MoveSectionUp { .. } => "move_section_up",
            Self::MoveSectionDown { .. } => "move_section_down",
            Self::AddTextBlock { .. } => "add_text_block",
            Self::AddImageBlock { .. } => "add_image_block",
            Self::RemoveBlock { .. } => "remove_block",
            Self::SetTextBlock { .. } => "set_text_block",
            Self::SetImageCaption { .. } => "set_image_caption",
            Self::SetImageNote { .. } => "set_image_note",
        }
    }
}
