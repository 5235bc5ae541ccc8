//! Note list and detail use cases.
//!
//! # Responsibility
//! - Add, delete and list notes of one notebook.
//! - Persist edits when an editing session ends.
//! - Apply the toolbar styling actions, including the background-context
//!   pattern fill that is merged back into the main context.
//!
//! # Invariants
//! - Note lists are sorted by `creation_date DESC`.
//! - Previews are derived from the plain rendering of `attributed_text`.

use crate::model::attributed_text::{AttributedText, Color, PatternFill};
use crate::model::note::{Note, NoteId};
use crate::model::notebook::NotebookId;
use crate::service::action::{ActionError, ActionResult, UserAction};
use crate::store::{ObjectContext, StoreError, StoreHandle, StoreResult};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

const PREVIEW_MAX_CHARS: usize = 100;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// A note row for list screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListItem {
    pub note: Note,
    /// Whitespace-collapsed plain text, at most 100 chars.
    pub preview: String,
}

/// Note facade over a store handle.
pub struct NoteService {
    store: StoreHandle,
}

impl NoteService {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    fn context(&self) -> &ObjectContext {
        self.store.main_context()
    }

    /// Adds a placeholder note to `notebook_id` and saves.
    pub fn add_note(&self, notebook_id: NotebookId) -> ActionResult<Note> {
        let action = UserAction::AddNote;
        let note = self
            .context()
            .insert_note(notebook_id)
            .map_err(|err| ActionError::new(action, err))?;
        self.save(action)?;
        info!("event=note_add module=service status=ok");
        Ok(note)
    }

    pub fn delete_note(&self, id: NoteId) -> ActionResult<()> {
        let action = UserAction::DeleteNote;
        self.context()
            .delete_note(id)
            .map_err(|err| ActionError::new(action, err))?;
        self.save(action)?;
        info!("event=note_delete module=service status=ok");
        Ok(())
    }

    pub fn get_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        self.context().get_note(id)
    }

    /// Lists notes of a notebook, newest first.
    pub fn list_notes(&self, notebook_id: NotebookId) -> StoreResult<Vec<NoteListItem>> {
        let notes = self.context().fetch_notes(notebook_id)?;
        Ok(notes
            .into_iter()
            .map(|note| {
                let preview = derive_preview(note.attributed_text());
                NoteListItem { note, preview }
            })
            .collect())
    }

    /// Stores the edited body when an editing session ends.
    pub fn finish_editing(&self, id: NoteId, text: AttributedText) -> ActionResult<Note> {
        let action = UserAction::EditNote;
        self.context()
            .set_note_attributed_text(id, text)
            .map_err(|err| ActionError::new(action, err))?;
        self.save(action)?;
        self.reload(action, id)
    }

    pub fn apply_bold(&self, id: NoteId, range: Range<usize>) -> ActionResult<Note> {
        self.restyle(id, |text| text.apply_bold(range))
    }

    pub fn apply_red_underline(&self, id: NoteId, range: Range<usize>) -> ActionResult<Note> {
        self.restyle(id, |text| text.apply_underline(range, Color::RED))
    }

    /// Fills `range` with the cow pattern from the background context.
    ///
    /// The background save is merged into the main context before the
    /// main-context view of the note is returned. Must be called from a
    /// tokio runtime context.
    pub async fn apply_cow_pattern(&self, id: NoteId, range: Range<usize>) -> ActionResult<Note> {
        let action = UserAction::EditNote;
        let outcome = self
            .store
            .perform_background_task(move |background| -> StoreResult<()> {
                let note = background
                    .get_note(id)?
                    .ok_or(StoreError::NoteNotFound(id))?;
                let mut text = note.attributed_text().clone();
                text.apply_pattern_fill(range, PatternFill::Cow);
                background.set_note_attributed_text(id, text)?;
                background.save()?;
                Ok(())
            })
            .await;

        match outcome {
            Ok(Ok(())) => self.reload(action, id),
            Ok(Err(err)) => Err(ActionError::new(action, err)),
            Err(err) => Err(ActionError::new(
                action,
                StoreError::Background(err.to_string()),
            )),
        }
    }

    fn restyle(&self, id: NoteId, edit: impl FnOnce(&mut AttributedText)) -> ActionResult<Note> {
        let action = UserAction::EditNote;
        let note = self.reload(action, id)?;
        let mut text = note.attributed_text().clone();
        edit(&mut text);
        self.finish_editing(id, text)
    }

    fn reload(&self, action: UserAction, id: NoteId) -> ActionResult<Note> {
        self.context()
            .get_note(id)
            .and_then(|note| note.ok_or(StoreError::NoteNotFound(id)))
            .map_err(|err| ActionError::new(action, err))
    }

    fn save(&self, action: UserAction) -> ActionResult<()> {
        self.context()
            .save()
            .map(|_| ())
            .map_err(|err| ActionError::new(action, err))
    }
}

/// Derives the list-cell preview from styled text.
pub fn derive_preview(text: &AttributedText) -> String {
    let plain = text.to_plain_string();
    let normalized = WHITESPACE_RE.replace_all(&plain, " ");
    normalized.trim().chars().take(PREVIEW_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::derive_preview;
    use crate::model::attributed_text::AttributedText;

    #[test]
    fn preview_collapses_whitespace() {
        let preview = derive_preview(&AttributedText::plain("  Buy\n\nmilk\tand   eggs "));
        assert_eq!(preview, "Buy milk and eggs");
    }

    #[test]
    fn preview_is_capped_at_100_chars() {
        let preview = derive_preview(&AttributedText::plain("x".repeat(250)));
        assert_eq!(preview.chars().count(), 100);
    }
}
