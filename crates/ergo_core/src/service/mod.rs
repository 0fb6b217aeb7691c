//! Core document services.
//!
//! # Responsibility
//! - Own the editable document model and its cross-component invariants.
//! - Keep UI bridges decoupled from generation and storage details.

pub mod document;
pub mod edit;
pub mod people;
pub mod section_tree;
