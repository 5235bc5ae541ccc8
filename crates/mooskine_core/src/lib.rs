//! Core storage logic for Mooskine notebooks and notes.
//! This crate is the single source of truth for persistence invariants.

pub mod autosave;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use autosave::{start_autosave, AutosaveHandle, DEFAULT_AUTOSAVE_INTERVAL_SECS};
pub use config::{ConfigError, ConfigResult, StoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::attributed_text::{AttributedText, Color, PatternFill, TextAttributes, TextRun};
pub use model::note::{Note, NoteId, PLACEHOLDER_NOTE_TEXT};
pub use model::notebook::{Notebook, NotebookId};
pub use service::note_service::{NoteListItem, NoteService};
pub use service::notebook_service::{NotebookService, NotebookSummary};
pub use service::{ActionError, ActionResult, UserAction};
pub use store::{
    ChangeOrigin, ChangeSet, ContextChange, ContextKind, MergePolicy, ObjectContext, ObjectRef,
    StoreError, StoreHandle, StoreLocation, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
