//! User-action failures.

use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ActionResult<T> = Result<T, ActionError>;

/// Explicit user actions that save immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    AddNotebook,
    DeleteNotebook,
    AddNote,
    DeleteNote,
    EditNote,
}

impl UserAction {
    /// Title for the modal error message.
    pub fn failure_title(self) -> &'static str {
        match self {
            Self::AddNotebook => "Unable to Add Notebook",
            Self::DeleteNotebook => "Unable to Delete Notebook",
            Self::AddNote => "Unable to Add Note",
            Self::DeleteNote => "Unable to Delete Note",
            Self::EditNote => "Unable to Save Note",
        }
    }
}

/// A user action whose store work failed.
#[derive(Debug)]
pub struct ActionError {
    pub action: UserAction,
    pub source: StoreError,
}

impl ActionError {
    pub fn new(action: UserAction, source: StoreError) -> Self {
        Self { action, source }
    }

    pub fn title(&self) -> &'static str {
        self.action.failure_title()
    }

    /// Body for the modal error message, carrying the underlying description.
    pub fn message(&self) -> String {
        format!("The following error occurred:\n{}", self.source)
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.source)
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
