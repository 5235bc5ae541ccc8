//! List/detail use-case services.
//!
//! # Responsibility
//! - Turn user actions (add, delete, edit, style) into context mutations
//!   followed by an immediate save.
//! - Surface failed saves as [`ActionError`] for a modal error message.
//!
//! # Invariants
//! - Fetch failures are returned to the caller, never swallowed.
//! - A failed save keeps pending changes so autosave can retry them.

mod action;
pub mod note_service;
pub mod notebook_service;

pub use action::{ActionError, ActionResult, UserAction};
