//! Note domain model.
//!
//! # Invariants
//! - Every note references exactly one parent notebook.
//! - `creation_date` is assigned once by the insert hook and has no setter.
//! - `text` is the legacy plain body; `attributed_text` is the live one.

use crate::model::attributed_text::AttributedText;
use crate::model::lifecycle::AwakeFromInsert;
use crate::model::notebook::NotebookId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;

/// Content given to notes created by the "add note" action.
pub const PLACEHOLDER_NOTE_TEXT: &str = "New note";

/// A single styled-text entry belonging to one notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    notebook_id: NotebookId,
    text: Option<String>,
    attributed_text: AttributedText,
    creation_date: i64,
}

impl Note {
    pub(crate) fn placeholder(notebook_id: NotebookId) -> Self {
        Self {
            id: Uuid::new_v4(),
            notebook_id,
            text: Some(PLACEHOLDER_NOTE_TEXT.to_string()),
            attributed_text: AttributedText::plain(PLACEHOLDER_NOTE_TEXT),
            creation_date: 0,
        }
    }

    pub(crate) fn from_parts(
        id: NoteId,
        notebook_id: NotebookId,
        text: Option<String>,
        attributed_text: AttributedText,
        creation_date: i64,
    ) -> Self {
        Self {
            id,
            notebook_id,
            text,
            attributed_text,
            creation_date,
        }
    }

    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn notebook_id(&self) -> NotebookId {
        self.notebook_id
    }

    /// Legacy plain-text body kept for backward compatibility.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attributed_text(&self) -> &AttributedText {
        &self.attributed_text
    }

    /// Unix epoch milliseconds.
    pub fn creation_date(&self) -> i64 {
        self.creation_date
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = Some(text);
    }

    pub(crate) fn set_attributed_text(&mut self, attributed_text: AttributedText) {
        self.attributed_text = attributed_text;
    }
}

impl AwakeFromInsert for Note {
    fn awake_from_insert(&mut self, creation_date: i64) {
        self.creation_date = creation_date;
    }
}

#[cfg(test)]
mod tests {
    use super::{Note, PLACEHOLDER_NOTE_TEXT};
    use crate::model::lifecycle::materialize;
    use uuid::Uuid;

    #[test]
    fn materialized_note_gets_stamp_and_placeholder() {
        let notebook_id = Uuid::new_v4();
        let note = materialize(Note::placeholder(notebook_id));

        assert!(note.creation_date() > 0);
        assert_eq!(note.notebook_id(), notebook_id);
        assert_eq!(note.text(), Some(PLACEHOLDER_NOTE_TEXT));
        assert_eq!(
            note.attributed_text().to_plain_string(),
            PLACEHOLDER_NOTE_TEXT
        );
    }
}
