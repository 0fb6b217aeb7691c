//! Author/affiliation association model.
//!
//! # Responsibility
//! - Own the ordered author and affiliation lists.
//! - Maintain the many-to-many author -> affiliation association.
//! - Issue monotonic ids that are never reused.
//!
//! # Invariants
//! - Every id in any `Author::affiliation_ids` names an existing affiliation.
//! - Removing an affiliation strips it from every author in the same call.
//! - `next_*_id` counters only grow; they always exceed every issued id.
//! - Stale indices are rejected without touching state.

use crate::model::people::{Affiliation, AffiliationId, Author, AuthorId};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Largest id adopted verbatim from persisted data. Larger ids are reissued
/// so the next-id counters cannot overflow.
pub const MAX_PERSISTED_ID: u64 = i64::MAX as u64;

/// Errors from people edits. All variants are stale-reference conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeopleError {
    /// Author index is out of bounds.
    AuthorNotFound(usize),
    /// Affiliation index is out of bounds.
    AffiliationNotFound(usize),
    /// Affiliation id does not name an existing affiliation.
    UnknownAffiliation(AffiliationId),
}

impl Display for PeopleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorNotFound(index) => write!(f, "author index out of range: {index}"),
            Self::AffiliationNotFound(index) => {
                write!(f, "affiliation index out of range: {index}")
            }
            Self::UnknownAffiliation(id) => write!(f, "affiliation id does not exist: {id}"),
        }
    }
}

impl Error for PeopleError {}

/// Summary of repairs applied while adopting persisted people data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeopleRepairs {
    /// Zero, out-of-range or duplicate ids that received fresh ones.
    pub ids_reassigned: usize,
    /// Author references to missing affiliations that were dropped.
    pub dangling_refs_dropped: usize,
    /// Duplicate references inside one author that were collapsed.
    pub duplicate_refs_dropped: usize,
}

/// Authors, affiliations and their association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeopleModel {
    authors: Vec<Author>,
    affiliations: Vec<Affiliation>,
    next_author_id: AuthorId,
    next_affiliation_id: AffiliationId,
    has_named_affiliation: bool,
}

impl Default for PeopleModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PeopleModel {
    /// Creates an empty model whose first ids will be `1`.
    pub fn new() -> Self {
        Self {
            authors: Vec::new(),
            affiliations: Vec::new(),
            next_author_id: 1,
            next_affiliation_id: 1,
            has_named_affiliation: false,
        }
    }

    /// Adopts persisted lists, recovering id counters as `max + 1`.
    ///
    /// Zero, out-of-range and duplicate ids are reissued past the counters.
    /// Author references follow an affiliation whose id was reissued to the
    /// first affiliation that carried the old id; references that still do
    /// not resolve are dropped so the association invariant holds from the
    /// first operation on.
    pub fn from_parts(
        mut authors: Vec<Author>,
        mut affiliations: Vec<Affiliation>,
    ) -> (Self, PeopleRepairs) {
        let mut repairs = PeopleRepairs::default();

        let mut next_affiliation_id = next_id_after(affiliations.iter().map(|a| a.id));
        let mut resolved: HashMap<AffiliationId, AffiliationId> = HashMap::new();
        let mut taken = HashSet::new();
        for affiliation in &mut affiliations {
            let stored = affiliation.id;
            if !is_adoptable_id(stored) || taken.contains(&stored) {
                affiliation.id = next_affiliation_id;
                next_affiliation_id += 1;
                repairs.ids_reassigned += 1;
            }
            taken.insert(affiliation.id);
            resolved.entry(stored).or_insert(affiliation.id);
        }

        let mut next_author_id = next_id_after(authors.iter().map(|a| a.id));
        let mut author_ids = HashSet::new();
        for author in &mut authors {
            if !is_adoptable_id(author.id) || author_ids.contains(&author.id) {
                author.id = next_author_id;
                next_author_id += 1;
                repairs.ids_reassigned += 1;
            }
            author_ids.insert(author.id);

            let mut seen = HashSet::new();
            let stored_refs = std::mem::take(&mut author.affiliation_ids);
            for stored in stored_refs {
                let Some(id) = resolved.get(&stored).copied() else {
                    repairs.dangling_refs_dropped += 1;
                    continue;
                };
                if !seen.insert(id) {
                    repairs.duplicate_refs_dropped += 1;
                    continue;
                }
                author.affiliation_ids.push(id);
            }
        }

        let mut model = Self {
            authors,
            affiliations,
            next_author_id,
            next_affiliation_id,
            has_named_affiliation: false,
        };
        model.refresh_named_flag();
        (model, repairs)
    }

    /// Ordered authors.
    pub fn authors(&self) -> &[Author] {
        &self.authors
    }

    /// Ordered affiliations.
    pub fn affiliations(&self) -> &[Affiliation] {
        &self.affiliations
    }

    /// Derived flag: at least one affiliation has a non-blank name.
    pub fn has_named_affiliation(&self) -> bool {
        self.has_named_affiliation
    }

    /// Id the next added author will receive.
    pub fn next_author_id(&self) -> AuthorId {
        self.next_author_id
    }

    /// Id the next added affiliation will receive.
    pub fn next_affiliation_id(&self) -> AffiliationId {
        self.next_affiliation_id
    }

    /// Position of an affiliation in the ordered list.
    pub fn affiliation_position(&self, affiliation_id: AffiliationId) -> Option<usize> {
        self.affiliations.iter().position(|a| a.id == affiliation_id)
    }

    /// Appends an unnamed affiliation with a fresh id.
    pub fn add_affiliation(&mut self) -> Affiliation {
        let affiliation = Affiliation::new(self.issue_affiliation_id());
        self.affiliations.push(affiliation.clone());
        self.refresh_named_flag();
        affiliation
    }

    /// Removes one affiliation and cascades the removal to every author.
    pub fn remove_affiliation(&mut self, index: usize) -> Result<Affiliation, PeopleError> {
        if index >= self.affiliations.len() {
            return Err(PeopleError::AffiliationNotFound(index));
        }
        let removed = self.affiliations.remove(index);
        for author in &mut self.authors {
            author.affiliation_ids.retain(|id| *id != removed.id);
        }
        self.refresh_named_flag();
        Ok(removed)
    }

    /// Renames one affiliation.
    pub fn set_affiliation_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), PeopleError> {
        let affiliation = self
            .affiliations
            .get_mut(index)
            .ok_or(PeopleError::AffiliationNotFound(index))?;
        affiliation.name = name.into();
        self.refresh_named_flag();
        Ok(())
    }

    /// Appends an empty author with a fresh id.
    pub fn add_author(&mut self) -> Author {
        let author = Author::new(self.issue_author_id());
        self.authors.push(author.clone());
        author
    }

    /// Removes one author. Affiliations are unaffected.
    pub fn remove_author(&mut self, index: usize) -> Result<Author, PeopleError> {
        if index >= self.authors.len() {
            return Err(PeopleError::AuthorNotFound(index));
        }
        Ok(self.authors.remove(index))
    }

    /// Sets one author's display name.
    pub fn set_author_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), PeopleError> {
        self.author_mut(index)?.name = name.into();
        Ok(())
    }

    /// Sets one author's ORCID iD, stored verbatim.
    pub fn set_author_orcid(
        &mut self,
        index: usize,
        orcid: impl Into<String>,
    ) -> Result<(), PeopleError> {
        self.author_mut(index)?.orcid = orcid.into();
        Ok(())
    }

    /// Adds or removes one affiliation from one author.
    ///
    /// Returns whether the association changed. Re-applying the same call is
    /// a no-op returning `false`.
    pub fn set_author_affiliation(
        &mut self,
        author_index: usize,
        affiliation_id: AffiliationId,
        present: bool,
    ) -> Result<bool, PeopleError> {
        if author_index >= self.authors.len() {
            return Err(PeopleError::AuthorNotFound(author_index));
        }
        if present && self.affiliation_position(affiliation_id).is_none() {
            return Err(PeopleError::UnknownAffiliation(affiliation_id));
        }

        let author = &mut self.authors[author_index];
        let current = author.affiliation_ids.iter().position(|id| *id == affiliation_id);
        match (present, current) {
            (true, None) => {
                author.affiliation_ids.push(affiliation_id);
                Ok(true)
            }
            (false, Some(position)) => {
                author.affiliation_ids.remove(position);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn author_mut(&mut self, index: usize) -> Result<&mut Author, PeopleError> {
        self.authors
            .get_mut(index)
            .ok_or(PeopleError::AuthorNotFound(index))
    }

    fn issue_author_id(&mut self) -> AuthorId {
        let id = self.next_author_id;
        self.next_author_id += 1;
        id
    }

    fn issue_affiliation_id(&mut self) -> AffiliationId {
        let id = self.next_affiliation_id;
        self.next_affiliation_id += 1;
        id
    }

    fn refresh_named_flag(&mut self) {
        self.has_named_affiliation = self.affiliations.iter().any(Affiliation::is_named);
    }
}

fn is_adoptable_id(id: u64) -> bool {
    (1..=MAX_PERSISTED_ID).contains(&id)
}

fn next_id_after(ids: impl Iterator<Item = u64>) -> u64 {
    ids.filter(|id| is_adoptable_id(*id))
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::{PeopleError, PeopleModel, MAX_PERSISTED_ID};
    use crate::model::people::{Affiliation, Author};

    #[test]
    fn first_ids_start_at_one() {
        let mut people = PeopleModel::new();
        assert_eq!(people.add_affiliation().id, 1);
        assert_eq!(people.add_author().id, 1);
    }

    #[test]
    fn removed_ids_are_never_reissued() {
        let mut people = PeopleModel::new();
        people.add_affiliation();
        people.add_affiliation();
        people.remove_affiliation(1).unwrap();
        assert_eq!(people.add_affiliation().id, 3);

        people.add_author();
        people.remove_author(0).unwrap();
        assert_eq!(people.add_author().id, 2);
    }

    #[test]
    fn set_author_affiliation_is_idempotent() {
        let mut people = PeopleModel::new();
        let affiliation = people.add_affiliation();
        people.add_author();

        assert!(people.set_author_affiliation(0, affiliation.id, true).unwrap());
        assert!(!people.set_author_affiliation(0, affiliation.id, true).unwrap());
        assert_eq!(people.authors()[0].affiliation_ids, vec![affiliation.id]);

        assert!(people.set_author_affiliation(0, affiliation.id, false).unwrap());
        assert!(!people.set_author_affiliation(0, affiliation.id, false).unwrap());
        assert!(people.authors()[0].affiliation_ids.is_empty());
    }

    #[test]
    fn set_author_affiliation_rejects_stale_references() {
        let mut people = PeopleModel::new();
        people.add_author();

        assert_eq!(
            people.set_author_affiliation(3, 1, true),
            Err(PeopleError::AuthorNotFound(3))
        );
        assert_eq!(
            people.set_author_affiliation(0, 99, true),
            Err(PeopleError::UnknownAffiliation(99))
        );
        assert!(!people.set_author_affiliation(0, 99, false).unwrap());
    }

    #[test]
    fn named_flag_tracks_affiliation_names() {
        let mut people = PeopleModel::new();
        people.add_affiliation();
        assert!(!people.has_named_affiliation());

        people.set_affiliation_name(0, "   ").unwrap();
        assert!(!people.has_named_affiliation());

        people.set_affiliation_name(0, "Dept. of Psychology").unwrap();
        assert!(people.has_named_affiliation());

        people.remove_affiliation(0).unwrap();
        assert!(!people.has_named_affiliation());
    }

    #[test]
    fn from_parts_recovers_counters_and_drops_dangling_refs() {
        let affiliations = vec![Affiliation {
            id: 4,
            name: "Uni".to_string(),
        }];
        let authors = vec![Author {
            id: 7,
            name: "Ada".to_string(),
            orcid: String::new(),
            affiliation_ids: vec![4, 9, 4],
        }];

        let (mut people, repairs) = PeopleModel::from_parts(authors, affiliations);
        assert_eq!(repairs.dangling_refs_dropped, 1);
        assert_eq!(repairs.duplicate_refs_dropped, 1);
        assert_eq!(people.authors()[0].affiliation_ids, vec![4]);
        assert!(people.has_named_affiliation());
        assert_eq!(people.add_author().id, 8);
        assert_eq!(people.add_affiliation().id, 5);
    }

    #[test]
    fn from_parts_reissues_missing_and_duplicate_affiliation_ids() {
        let affiliations = vec![
            Affiliation {
                id: 0,
                name: "A".to_string(),
            },
            Affiliation {
                id: 0,
                name: "B".to_string(),
            },
        ];
        let authors = vec![Author {
            id: 1,
            affiliation_ids: vec![0],
            ..Author::default()
        }];

        let (mut people, repairs) = PeopleModel::from_parts(authors, affiliations);
        assert_eq!(repairs.ids_reassigned, 2);
        let ids: Vec<u64> = people.affiliations().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(people.authors()[0].affiliation_ids, vec![1]);

        people.remove_affiliation(1).unwrap();
        assert_eq!(people.authors()[0].affiliation_ids, vec![1]);
        assert_eq!(people.affiliations()[0].name, "A");
        assert_eq!(people.add_affiliation().id, 3);
    }

    #[test]
    fn from_parts_reissues_out_of_range_and_duplicate_author_ids() {
        let authors = vec![
            Author {
                id: u64::MAX,
                ..Author::default()
            },
            Author {
                id: 5,
                ..Author::default()
            },
            Author {
                id: 5,
                ..Author::default()
            },
        ];

        let (mut people, repairs) = PeopleModel::from_parts(authors, Vec::new());
        assert_eq!(repairs.ids_reassigned, 2);
        let ids: Vec<u64> = people.authors().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![6, 5, 7]);
        assert_eq!(people.add_author().id, 8);

        let (mut people, _) = PeopleModel::from_parts(
            vec![Author {
                id: MAX_PERSISTED_ID,
                ..Author::default()
            }],
            Vec::new(),
        );
        assert_eq!(people.authors()[0].id, MAX_PERSISTED_ID);
        assert_eq!(people.add_author().id, MAX_PERSISTED_ID + 1);
    }
}
