//! Aggregate document state.
//!
//! # Responsibility
//! - Aggregate scalar document fields, `PeopleModel` and `SectionTree`.
//! - Keep cross-component invariants (implicit introduction title mirror,
//!   unique image labels) that neither component can see alone.
//! - Convert to and from `DocumentSnapshot`, repairing persisted data on load.
//!
//! # Invariants
//! - The implicit introduction title always equals the document title.
//! - Image labels are unique within the document.
//! - `validate()` holds after every public operation.

use crate::collab::UniqueIdSource;
use crate::model::formatting::FormattingOptions;
use crate::model::people::{AffiliationId, AuthorId};
use crate::model::section::{
    is_valid_image_label, is_valid_section_id, new_section_id, ContentBlock, Section,
    SectionBody, SectionLevel,
};
use crate::model::snapshot::{DocumentSnapshot, SectionRecord};
use crate::service::edit::Edit;
use crate::service::people::{PeopleError, PeopleModel};
use crate::service::section_tree::{SectionTree, SectionTreeError};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix of generated image labels.
pub const IMAGE_LABEL_PREFIX: &str = "img:";

/// Error-handling class of a rejected edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditErrorKind {
    /// Addressed index or id no longer exists.
    InvalidReference,
    /// Subsection requested beyond the deepest level.
    DepthExceeded,
    /// Request is well-formed but not allowed.
    Rejected,
}

/// Rejected document edit. State is unchanged whenever this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    People(PeopleError),
    Sections(SectionTreeError),
}

impl EditError {
    pub fn kind(&self) -> EditErrorKind {
        match self {
            Self::People(_) => EditErrorKind::InvalidReference,
            Self::Sections(SectionTreeError::DepthExceeded { .. }) => EditErrorKind::DepthExceeded,
            Self::Sections(err) if err.is_invalid_reference() => EditErrorKind::InvalidReference,
            Self::Sections(_) => EditErrorKind::Rejected,
        }
    }
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::People(err) => write!(f, "{err}"),
            Self::Sections(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::People(err) => Some(err),
            Self::Sections(err) => Some(err),
        }
    }
}

impl From<PeopleError> for EditError {
    fn from(value: PeopleError) -> Self {
        Self::People(value)
    }
}

impl From<SectionTreeError> for EditError {
    fn from(value: SectionTreeError) -> Self {
        Self::Sections(value)
    }
}

/// Cross-component invariant violation found by `DocumentState::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    /// An implicit section appears somewhere other than index 0.
    MisplacedImplicitSection(usize),
    /// Implicit introduction title differs from the document title.
    ImplicitTitleMismatch,
    /// Author references an affiliation that does not exist.
    DanglingAffiliation {
        author_id: AuthorId,
        affiliation_id: AffiliationId,
    },
    /// Author lists the same affiliation twice.
    DuplicateAffiliationRef {
        author_id: AuthorId,
        affiliation_id: AffiliationId,
    },
    DuplicateAuthorId(AuthorId),
    DuplicateAffiliationId(AffiliationId),
    /// An issued id is not below the next-id counter.
    IdCounterBehind { id: u64, next: u64 },
    DuplicateSectionId(String),
    DuplicateImageLabel(String),
}

impl Display for DocumentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MisplacedImplicitSection(index) => {
                write!(f, "implicit section found at index {index}")
            }
            Self::ImplicitTitleMismatch => {
                write!(f, "implicit introduction title does not mirror the document title")
            }
            Self::DanglingAffiliation {
                author_id,
                affiliation_id,
            } => write!(
                f,
                "author {author_id} references missing affiliation {affiliation_id}"
            ),
            Self::DuplicateAffiliationRef {
                author_id,
                affiliation_id,
            } => write!(
                f,
                "author {author_id} lists affiliation {affiliation_id} twice"
            ),
            Self::DuplicateAuthorId(id) => write!(f, "duplicate author id: {id}"),
            Self::DuplicateAffiliationId(id) => write!(f, "duplicate affiliation id: {id}"),
            Self::IdCounterBehind { id, next } => {
                write!(f, "id {id} is not below next id counter {next}")
            }
            Self::DuplicateSectionId(id) => write!(f, "duplicate section id: {id}"),
            Self::DuplicateImageLabel(label) => write!(f, "duplicate image label: {label}"),
        }
    }
}

impl Error for DocumentValidationError {}

/// Repairs applied while adopting a persisted snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Author or affiliation ids that were missing, duplicated or out of range.
    pub people_ids_reassigned: usize,
    pub dangling_refs_dropped: usize,
    pub duplicate_refs_dropped: usize,
    pub levels_clamped: usize,
    pub section_ids_assigned: usize,
    pub labels_assigned: usize,
}

impl LoadReport {
    /// Whether the snapshot was adopted without any repair.
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// In-memory document being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    title: String,
    pub running_head: String,
    pub author_notes: String,
    pub course: String,
    pub instructor: String,
    pub due_date: String,
    pub abstract_text: String,
    /// Comma-separated, stored verbatim.
    pub keywords: String,
    pub formatting: FormattingOptions,
    pub abstract_as_description: bool,
    people: PeopleModel,
    sections: SectionTree,
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentState {
    /// Creates the empty document of a new project.
    pub fn new() -> Self {
        Self {
            title: String::new(),
            running_head: String::new(),
            author_notes: String::new(),
            course: String::new(),
            instructor: String::new(),
            due_date: String::new(),
            abstract_text: String::new(),
            keywords: String::new(),
            formatting: FormattingOptions::default(),
            abstract_as_description: false,
            people: PeopleModel::new(),
            sections: SectionTree::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the document title and mirrors it into the implicit introduction.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.sections.sync_implicit_title(&self.title);
    }

    pub fn people(&self) -> &PeopleModel {
        &self.people
    }

    pub fn people_mut(&mut self) -> &mut PeopleModel {
        &mut self.people
    }

    pub fn sections(&self) -> &SectionTree {
        &self.sections
    }

    /// Mutable section tree. The implicit introduction stays out of reach:
    /// it can only be toggled through `set_implicit_introduction`.
    pub fn sections_mut(&mut self) -> &mut SectionTree {
        &mut self.sections
    }

    /// Whether the implicit introduction section is present.
    pub fn implicit_introduction(&self) -> bool {
        self.sections.has_implicit_introduction()
    }

    /// Adds or removes the implicit introduction. Returns whether it changed.
    pub fn set_implicit_introduction(&mut self, enabled: bool) -> bool {
        self.sections.set_implicit_introduction(enabled, &self.title)
    }

    /// Appends an image block with a fresh document-unique label.
    pub fn add_image_block(
        &mut self,
        section_index: usize,
        path: &str,
        ids: &dyn UniqueIdSource,
    ) -> Result<String, EditError> {
        let taken: HashSet<String> = self.sections.image_labels().map(str::to_string).collect();
        let label = unique_label(ids, &taken);
        Ok(self.sections.add_image_block(section_index, path, label)?)
    }

    /// Applies one edit command.
    pub fn apply(&mut self, edit: Edit, ids: &dyn UniqueIdSource) -> Result<(), EditError> {
        match edit {
            Edit::SetTitle { value } => self.set_title(value),
            Edit::SetRunningHead { value } => self.running_head = value,
            Edit::SetAuthorNotes { value } => self.author_notes = value,
            Edit::SetCourse { value } => self.course = value,
            Edit::SetInstructor { value } => self.instructor = value,
            Edit::SetDueDate { value } => self.due_date = value,
            Edit::SetAbstract { value } => self.abstract_text = value,
            Edit::SetKeywords { value } => self.keywords = value,
            Edit::SetFontFamily { value } => self.formatting.font_family = value,
            Edit::SetFontSize { value } => self.formatting.font_size = value,
            Edit::SetPaperSize { value } => self.formatting.paper_size = value,
            Edit::SetRegion { value } => self.formatting.region = value,
            Edit::SetLanguage { value } => self.formatting.language = value,
            Edit::SetImplicitIntroduction { enabled } => {
                self.set_implicit_introduction(enabled);
            }
            Edit::SetAbstractAsDescription { enabled } => self.abstract_as_description = enabled,

            Edit::AddAffiliation => {
                self.people.add_affiliation();
            }
            Edit::RemoveAffiliation { index } => {
                self.people.remove_affiliation(index)?;
            }
            Edit::SetAffiliationName { index, name } => {
                self.people.set_affiliation_name(index, name)?
            }
            Edit::AddAuthor => {
                self.people.add_author();
            }
            Edit::RemoveAuthor { index } => {
                self.people.remove_author(index)?;
            }
            Edit::SetAuthorName { index, name } => self.people.set_author_name(index, name)?,
            Edit::SetAuthorOrcid { index, orcid } => self.people.set_author_orcid(index, orcid)?,
            Edit::SetAuthorAffiliation {
                author_index,
                affiliation_id,
                present,
            } => {
                self.people
                    .set_author_affiliation(author_index, affiliation_id, present)?;
            }

            Edit::AddSection => {
                self.sections.add_section();
            }
            Edit::AddSubsection { parent_index } => {
                self.sections.add_subsection(parent_index)?;
            }
            Edit::RemoveSection { index } => {
                self.sections.remove_section(index)?;
            }
            Edit::SetSectionTitle { index, title } => {
                self.sections.set_section_title(index, title)?
            }
            Edit::MoveSectionUp { index } => {
                self.sections.move_section_up(index)?;
            }
            Edit::MoveSectionDown { index } => {
                self.sections.move_section_down(index)?;
            }

            Edit::AddTextBlock { section_index } => {
                self.sections.add_text_block(section_index)?;
            }
            Edit::AddImageBlock {
                section_index,
                path,
            } => {
                self.add_image_block(section_index, &path, ids)?;
            }
            Edit::RemoveBlock {
                section_index,
                block_index,
            } => {
                self.sections.remove_block(section_index, block_index)?;
            }
            Edit::SetTextBlock {
                section_index,
                block_index,
                content,
            } => self
                .sections
                .set_text_block(section_index, block_index, content)?,
            Edit::SetImageCaption {
                section_index,
                block_index,
                caption,
            } => self
                .sections
                .set_image_caption(section_index, block_index, caption)?,
            Edit::SetImageNote {
                section_index,
                block_index,
                note,
            } => self
                .sections
                .set_image_note(section_index, block_index, note)?,
        }
        Ok(())
    }

    /// Checks every cross-component invariant.
    pub fn validate(&self) -> Result<(), DocumentValidationError> {
        for (index, section) in self.sections.sections().iter().enumerate() {
            if section.is_implicit && index != 0 {
                return Err(DocumentValidationError::MisplacedImplicitSection(index));
            }
        }
        if let Some(first) = self.sections.get(0) {
            if first.is_implicit && first.title != self.title {
                return Err(DocumentValidationError::ImplicitTitleMismatch);
            }
        }

        let people = &self.people;
        let mut affiliation_ids = HashSet::new();
        for affiliation in people.affiliations() {
            if !affiliation_ids.insert(affiliation.id) {
                return Err(DocumentValidationError::DuplicateAffiliationId(affiliation.id));
            }
            if affiliation.id >= people.next_affiliation_id() {
                return Err(DocumentValidationError::IdCounterBehind {
                    id: affiliation.id,
                    next: people.next_affiliation_id(),
                });
            }
        }

        let mut author_ids = HashSet::new();
        for author in people.authors() {
            if !author_ids.insert(author.id) {
                return Err(DocumentValidationError::DuplicateAuthorId(author.id));
            }
            if author.id >= people.next_author_id() {
                return Err(DocumentValidationError::IdCounterBehind {
                    id: author.id,
                    next: people.next_author_id(),
                });
            }
            let mut seen = HashSet::new();
            for affiliation_id in &author.affiliation_ids {
                if !affiliation_ids.contains(affiliation_id) {
                    return Err(DocumentValidationError::DanglingAffiliation {
                        author_id: author.id,
                        affiliation_id: *affiliation_id,
                    });
                }
                if !seen.insert(*affiliation_id) {
                    return Err(DocumentValidationError::DuplicateAffiliationRef {
                        author_id: author.id,
                        affiliation_id: *affiliation_id,
                    });
                }
            }
        }

        let mut section_ids = HashSet::new();
        for section in self.sections.sections() {
            if !section_ids.insert(section.id.as_str()) {
                return Err(DocumentValidationError::DuplicateSectionId(
                    section.id.clone(),
                ));
            }
        }

        let mut labels = HashSet::new();
        for label in self.sections.image_labels() {
            if !labels.insert(label) {
                return Err(DocumentValidationError::DuplicateImageLabel(label.to_string()));
            }
        }
        Ok(())
    }

    /// Produces the complete serialized form of this document.
    pub fn to_snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            title: self.title.clone(),
            authors: self.people.authors().to_vec(),
            affiliations: self.people.affiliations().to_vec(),
            sections: self.sections.sections().iter().map(section_record).collect(),
            running_head: self.running_head.clone(),
            author_notes: self.author_notes.clone(),
            course: self.course.clone(),
            instructor: self.instructor.clone(),
            due_date: self.due_date.clone(),
            abstract_text: self.abstract_text.clone(),
            keywords: self.keywords.clone(),
            font_family: self.formatting.font_family.clone(),
            font_size: self.formatting.font_size,
            paper_size: self.formatting.paper_size.clone(),
            region: self.formatting.region.clone(),
            language: self.formatting.language.clone(),
            implicit_intro: self.implicit_introduction(),
            abstract_as_desc: self.abstract_as_description,
        }
    }

    /// Adopts a persisted snapshot, repairing anything that would break an
    /// invariant.
    pub fn from_snapshot(snapshot: DocumentSnapshot, ids: &dyn UniqueIdSource) -> (Self, LoadReport) {
        let mut report = LoadReport::default();

        let (people, repairs) = PeopleModel::from_parts(snapshot.authors, snapshot.affiliations);
        report.people_ids_reassigned = repairs.ids_reassigned;
        report.dangling_refs_dropped = repairs.dangling_refs_dropped;
        report.duplicate_refs_dropped = repairs.duplicate_refs_dropped;

        let mut section_ids = HashSet::new();
        let mut sections = Vec::with_capacity(snapshot.sections.len());
        for record in snapshot.sections {
            let mut section = section_from_record(record, &mut report);
            if !is_valid_section_id(&section.id) || !section_ids.insert(section.id.clone()) {
                section.id = new_section_id();
                section_ids.insert(section.id.clone());
                report.section_ids_assigned += 1;
            }
            sections.push(section);
        }

        let mut tree = SectionTree::from_sections(sections);
        report.labels_assigned = assign_missing_labels(&mut tree, ids);

        let mut document = Self {
            title: snapshot.title,
            running_head: snapshot.running_head,
            author_notes: snapshot.author_notes,
            course: snapshot.course,
            instructor: snapshot.instructor,
            due_date: snapshot.due_date,
            abstract_text: snapshot.abstract_text,
            keywords: snapshot.keywords,
            formatting: FormattingOptions {
                font_family: snapshot.font_family,
                font_size: snapshot.font_size,
                paper_size: snapshot.paper_size,
                region: snapshot.region,
                language: snapshot.language,
            },
            abstract_as_description: snapshot.abstract_as_desc,
            people,
            sections: tree,
        };
        document
            .sections
            .set_implicit_introduction(snapshot.implicit_intro, &document.title);
        document.sections.sync_implicit_title(&document.title);
        (document, report)
    }
}

fn section_record(section: &Section) -> SectionRecord {
    let (content, blocks) = match &section.body {
        SectionBody::Legacy(content) => (Some(content.clone()), None),
        SectionBody::Blocks(blocks) => (None, Some(blocks.clone())),
    };
    SectionRecord {
        id: section.id.clone(),
        title: section.title.clone(),
        level: i64::from(section.level.get()),
        content,
        blocks,
        is_implicit: section.is_implicit,
    }
}

fn section_from_record(record: SectionRecord, report: &mut LoadReport) -> Section {
    let level = SectionLevel::clamped(record.level);
    if i64::from(level.get()) != record.level {
        report.levels_clamped += 1;
    }
    // An empty block list next to non-empty legacy text predates blocks.
    let body = match (record.blocks, record.content) {
        (Some(blocks), Some(content)) if blocks.is_empty() && !content.is_empty() => {
            SectionBody::Legacy(content)
        }
        (Some(blocks), _) => SectionBody::Blocks(blocks),
        (None, content) => SectionBody::Legacy(content.unwrap_or_default()),
    };
    Section {
        id: record.id,
        title: record.title,
        level,
        body,
        is_implicit: record.is_implicit,
    }
}

fn assign_missing_labels(tree: &mut SectionTree, ids: &dyn UniqueIdSource) -> usize {
    let mut taken = HashSet::new();
    let mut assigned = 0;
    for section in tree.sections_mut() {
        let SectionBody::Blocks(blocks) = &mut section.body else {
            continue;
        };
        for block in blocks {
            let ContentBlock::Image(image) = block else {
                continue;
            };
            if !is_valid_image_label(&image.label) || taken.contains(&image.label) {
                image.label = unique_label(ids, &taken);
                assigned += 1;
            }
            taken.insert(image.label.clone());
        }
    }
    assigned
}

fn unique_label(ids: &dyn UniqueIdSource, taken: &HashSet<String>) -> String {
    let base = format!("{IMAGE_LABEL_PREFIX}{}", ids.generate_unique_id());
    let mut candidate = base.clone();
    let mut suffix = 2;
    while taken.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::{DocumentState, EditError, EditErrorKind};
    use crate::collab::UniqueIdSource;
    use crate::model::section::SectionBody;
    use crate::model::snapshot::{DocumentSnapshot, SectionRecord};
    use crate::service::edit::Edit;
    use crate::service::section_tree::SectionTreeError;

    struct FixedIds;

    impl UniqueIdSource for FixedIds {
        fn generate_unique_id(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn title_changes_are_mirrored_into_implicit_introduction() {
        let mut document = DocumentState::new();
        document.set_title("Draft");
        assert!(document.set_implicit_introduction(true));
        assert_eq!(document.sections().sections()[0].title, "Draft");

        document.set_title("Final Title");
        assert_eq!(document.sections().sections()[0].title, "Final Title");
        assert!(document.validate().is_ok());
    }

    #[test]
    fn colliding_ids_still_yield_unique_labels() {
        let mut document = DocumentState::new();
        document.sections_mut().add_section();
        let first = document.add_image_block(0, "images/a.png", &FixedIds).unwrap();
        let second = document.add_image_block(0, "images/b.png", &FixedIds).unwrap();
        assert_eq!(first, "img:fixed");
        assert_eq!(second, "img:fixed-2");
        assert!(document.validate().is_ok());
    }

    #[test]
    fn edit_error_kinds_follow_taxonomy() {
        let mut document = DocumentState::new();
        let err = document
            .apply(Edit::RemoveAuthor { index: 0 }, &FixedIds)
            .unwrap_err();
        assert_eq!(err.kind(), EditErrorKind::InvalidReference);

        for _ in 0..5 {
            document.sections_mut().add_section();
        }
        let mut parent = 0;
        for _ in 0..4 {
            let child = document.sections_mut().add_subsection(parent).unwrap();
            parent = document
                .sections()
                .sections()
                .iter()
                .position(|s| s.id == child.id)
                .unwrap();
        }
        let err = document
            .apply(Edit::AddSubsection { parent_index: parent }, &FixedIds)
            .unwrap_err();
        assert_eq!(err.kind(), EditErrorKind::DepthExceeded);

        let err = EditError::Sections(SectionTreeError::InvalidImagePath(String::new()));
        assert_eq!(err.kind(), EditErrorKind::Rejected);
    }

    #[test]
    fn snapshot_load_repairs_labels_levels_and_legacy_bodies() {
        let snapshot: DocumentSnapshot = serde_json::from_value(serde_json::json!({
            "title": "Paper",
            "implicit_intro": true,
            "sections": [
                {"id": "a", "title": "One", "level": 9, "content": "legacy text"},
                {"id": "a", "title": "Two", "level": 1, "blocks": [
                    {"type": "image", "path": "images/x.png"},
                    {"type": "text", "content": "body"}
                ]},
                {"title": "Three", "blocks": [], "content": "older text"}
            ]
        }))
        .unwrap();

        let (document, report) = DocumentState::from_snapshot(snapshot, &FixedIds);
        let sections = document.sections().sections();
        assert_eq!(sections.len(), 4);
        assert!(sections[0].is_implicit);
        assert_eq!(sections[0].title, "Paper");
        assert_eq!(sections[1].level.get(), 5);
        assert_eq!(sections[1].body, SectionBody::Legacy("legacy text".to_string()));
        assert_eq!(sections[3].body, SectionBody::Legacy("older text".to_string()));
        assert_eq!(report.levels_clamped, 1);
        assert_eq!(report.section_ids_assigned, 2);
        assert_eq!(report.labels_assigned, 1);
        assert!(document.validate().is_ok());
    }

    #[test]
    fn snapshot_round_trip_preserves_document() {
        let mut document = DocumentState::new();
        document.set_title("Round Trip");
        document.people_mut().add_affiliation();
        document.people_mut().add_author();
        document.people_mut().set_author_affiliation(0, 1, true).unwrap();
        document.sections_mut().add_section();
        document.sections_mut().add_subsection(0).unwrap();
        document.set_implicit_introduction(true);

        let snapshot = document.to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: DocumentSnapshot = serde_json::from_str(&json).unwrap();
        let (restored, report) = DocumentState::from_snapshot(decoded, &FixedIds);

        assert!(report.is_clean());
        assert_eq!(restored, document);
    }

    #[test]
    fn implicit_flag_false_drops_stray_implicit_section() {
        let snapshot = DocumentSnapshot {
            title: "T".to_string(),
            implicit_intro: false,
            sections: vec![SectionRecord {
                id: "intro".to_string(),
                title: "T".to_string(),
                is_implicit: true,
                ..SectionRecord::default()
            }],
            ..DocumentSnapshot::default()
        };
        let (document, _) = DocumentState::from_snapshot(snapshot, &FixedIds);
        assert!(document.sections().is_empty());
    }
}
