//! Notebook domain model.
//!
//! # Invariants
//! - `creation_date` is assigned once by the insert hook and has no setter.
//! - Deleting a notebook cascades to its notes (enforced by storage).

use crate::model::lifecycle::AwakeFromInsert;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotebookId = Uuid;

/// A named container of notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    id: NotebookId,
    name: String,
    creation_date: i64,
}

impl Notebook {
    pub(crate) fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            creation_date: 0,
        }
    }

    pub(crate) fn from_parts(id: NotebookId, name: String, creation_date: i64) -> Self {
        Self {
            id,
            name,
            creation_date,
        }
    }

    pub fn id(&self) -> NotebookId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unix epoch milliseconds.
    pub fn creation_date(&self) -> i64 {
        self.creation_date
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl AwakeFromInsert for Notebook {
    fn awake_from_insert(&mut self, creation_date: i64) {
        self.creation_date = creation_date;
    }
}
