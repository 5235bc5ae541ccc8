//! Domain model for notebooks and notes.
//!
//! # Responsibility
//! - Define the records persisted by the store.
//! - Own insert-time lifecycle hooks and styled text values.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - `creation_date` is set exactly once, at insertion.

pub mod attributed_text;
pub mod lifecycle;
pub mod note;
pub mod notebook;
