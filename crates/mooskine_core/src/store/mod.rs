//! Object store: handle, contexts and change propagation.
//!
//! # Responsibility
//! - Own the single SQLite connection backing the store.
//! - Stage edits in object contexts and commit them on save.
//! - Merge each context's saves into the other contexts and notify observers.
//!
//! # Invariants
//! - All SQL lives in `records`; contexts never build queries themselves.
//! - Lock order is context state first, then the shared connection.

mod changes;
mod context;
mod handle;
mod merge;
mod records;

pub use changes::{
    ChangeOrigin, ChangeSet, ContextChange, FieldKey, FieldUpdate, FieldValue, ObjectRef,
};
pub use context::{ContextKind, ObjectContext};
pub use handle::{StoreHandle, StoreLocation};
pub use merge::MergePolicy;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::note::NoteId;
use crate::model::notebook::NotebookId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for store open, fetch and save operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Config(ConfigError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    NotebookNotFound(NotebookId),
    NoteNotFound(NoteId),
    /// Caller-supplied value rejected before touching the store.
    InvalidInput(String),
    /// Persisted row cannot be decoded.
    InvalidData(String),
    LockPoisoned(&'static str),
    /// Background task panicked or was cancelled.
    Background(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "store io error at `{}`: {source}", path.display()),
            Self::NotebookNotFound(id) => write!(f, "notebook not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::LockPoisoned(what) => write!(f, "{what} lock poisoned"),
            Self::Background(message) => write!(f, "background task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
