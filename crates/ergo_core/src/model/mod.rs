//! Document domain model.
//!
//! # Responsibility
//! - Define canonical records for people, sections and content blocks.
//! - Define the snapshot shape shared with persistence and generators.
//!
//! # Invariants
//! - Sections are stored flat; hierarchy is encoded by `SectionLevel`.
//! - Author and affiliation ids are numeric and never reused.

pub mod formatting;
pub mod people;
pub mod section;
pub mod snapshot;
