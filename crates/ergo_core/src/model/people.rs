//! Author and affiliation domain records.
//!
//! # Invariants
//! - Ids are positive and never reused within one document lifetime.
//! - `Author::affiliation_ids` holds no duplicates.

use serde::{Deserialize, Serialize};

/// Numeric author identifier.
pub type AuthorId = u64;

/// Numeric affiliation identifier.
pub type AffiliationId = u64;

/// Institution or department an author belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Affiliation {
    pub id: AffiliationId,
    pub name: String,
}

impl Affiliation {
    /// Creates an unnamed affiliation.
    pub fn new(id: AffiliationId) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }

    /// Whether the name has any non-whitespace content.
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Document author.
///
/// `affiliation_ids` is serialized as `affiliationIds` to match the project
/// form-data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    /// Free-form ORCID iD; not validated.
    pub orcid: String,
    #[serde(rename = "affiliationIds")]
    pub affiliation_ids: Vec<AffiliationId>,
}

impl Author {
    /// Creates an author with empty fields and no affiliations.
    pub fn new(id: AuthorId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Whether this author references `affiliation_id`.
    pub fn has_affiliation(&self, affiliation_id: AffiliationId) -> bool {
        self.affiliation_ids.contains(&affiliation_id)
    }
}
