//! Change descriptions exchanged between contexts and observers.
//!
//! # Responsibility
//! - Name the objects and fields a save touched.
//! - Carry committed field values so other contexts can merge them.

use crate::model::attributed_text::AttributedText;
use crate::model::note::NoteId;
use crate::model::notebook::NotebookId;

/// Reference to one stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectRef {
    Notebook(NotebookId),
    Note(NoteId),
}

/// One mutable field of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    NotebookName(NotebookId),
    NoteText(NoteId),
    NoteAttributedText(NoteId),
}

impl FieldKey {
    pub fn object(&self) -> ObjectRef {
        match self {
            Self::NotebookName(id) => ObjectRef::Notebook(*id),
            Self::NoteText(id) | Self::NoteAttributedText(id) => ObjectRef::Note(*id),
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::NotebookName(_) => "notebooks.name",
            Self::NoteText(_) => "notes.text",
            Self::NoteAttributedText(_) => "notes.attributed_text",
        }
    }
}

/// Value of a [`FieldKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Plain text; `None` only for legacy notes without text.
    Text(Option<String>),
    AttributedText(AttributedText),
}

/// A field value as committed by a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub key: FieldKey,
    pub value: FieldValue,
}

/// Objects inserted, fields updated, and objects deleted by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub inserted: Vec<ObjectRef>,
    pub updated: Vec<FieldUpdate>,
    pub deleted: Vec<ObjectRef>,
}

impl ChangeSet {
    pub(crate) fn inserted(object: ObjectRef) -> Self {
        Self {
            inserted: vec![object],
            ..Self::default()
        }
    }

    pub(crate) fn updated(key: FieldKey, value: FieldValue) -> Self {
        Self {
            updated: vec![FieldUpdate { key, value }],
            ..Self::default()
        }
    }

    pub(crate) fn deleted(objects: Vec<ObjectRef>) -> Self {
        Self {
            deleted: objects,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns whether `object` was inserted, updated or deleted.
    pub fn touches(&self, object: ObjectRef) -> bool {
        self.inserted.contains(&object)
            || self.deleted.contains(&object)
            || self.updated.iter().any(|update| update.key.object() == object)
    }
}

/// Where a [`ContextChange`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Uncommitted mutation (or rollback) inside the context itself.
    Local,
    /// The context committed its pending changes.
    Saved,
    /// Another context's save was merged in.
    Merged,
}

/// Notification sent to a context's observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChange {
    pub origin: ChangeOrigin,
    pub changes: ChangeSet,
}
