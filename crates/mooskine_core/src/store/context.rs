//! Object contexts: staging areas for pending changes.
//!
//! # Responsibility
//! - Stage inserts, field edits and deletes until `save()`.
//! - Present fetches as "stored rows overlaid with pending changes".
//! - Merge other contexts' saves and publish change notifications.
//!
//! # Invariants
//! - A pending edit remembers the stored value it was based on; saving over
//!   a moved stored value is a conflict decided by the context's policy.
//! - A note is only inserted under a notebook visible to the context.
//! - Observers are notified after every mutation, save, rollback and merge.

use crate::model::attributed_text::AttributedText;
use crate::model::lifecycle::materialize;
use crate::model::note::{Note, NoteId};
use crate::model::notebook::{Notebook, NotebookId};
use crate::store::changes::{
    ChangeOrigin, ChangeSet, ContextChange, FieldKey, FieldUpdate, FieldValue, ObjectRef,
};
use crate::store::merge::{MergePolicy, Resolution};
use crate::store::records;
use crate::store::{StoreError, StoreResult};
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Which role a context plays for its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Bound to the UI thread.
    Main,
    /// Used from worker threads.
    Background,
}

impl ContextKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Background => "background",
        }
    }
}

/// Shared state behind every context of one store.
pub(crate) struct StoreCoordinator {
    conn: Mutex<Connection>,
    contexts: Mutex<Vec<Weak<ContextInner>>>,
}

impl StoreCoordinator {
    pub(crate) fn new(conn: Connection) -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(conn),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn lock_connection(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned("store connection"))
    }

    fn register(&self, context: &Arc<ContextInner>) -> StoreResult<()> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|_| StoreError::LockPoisoned("context registry"))?;
        contexts.retain(|weak| weak.strong_count() > 0);
        contexts.push(Arc::downgrade(context));
        Ok(())
    }

    /// Delivers a committed change set to every other live context.
    fn publish(&self, origin: &Arc<ContextInner>, changes: &ChangeSet) {
        let targets: Vec<Arc<ContextInner>> = match self.contexts.lock() {
            Ok(contexts) => contexts
                .iter()
                .filter_map(Weak::upgrade)
                .filter(|context| !Arc::ptr_eq(context, origin))
                .collect(),
            Err(_) => {
                warn!("event=context_publish module=store status=error error_code=registry_poisoned");
                return;
            }
        };

        for inner in targets {
            if !inner.merges_automatically {
                continue;
            }
            let context = ObjectContext { inner };
            if let Err(err) = context.merge_changes(changes) {
                warn!(
                    "event=context_merge module=store status=error context={} error={}",
                    context.kind().as_str(),
                    err
                );
            }
        }
    }
}

struct PendingEdit {
    value: FieldValue,
    base: FieldValue,
}

#[derive(Default)]
struct PendingChanges {
    inserted_notebooks: BTreeMap<NotebookId, Notebook>,
    inserted_notes: BTreeMap<NoteId, Note>,
    edits: BTreeMap<FieldKey, PendingEdit>,
    deleted_notebooks: BTreeSet<NotebookId>,
    deleted_notes: BTreeSet<NoteId>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.inserted_notebooks.is_empty()
            && self.inserted_notes.is_empty()
            && self.edits.is_empty()
            && self.deleted_notebooks.is_empty()
            && self.deleted_notes.is_empty()
    }

    fn forget_note(&mut self, id: NoteId) {
        self.edits.remove(&FieldKey::NoteText(id));
        self.edits.remove(&FieldKey::NoteAttributedText(id));
        self.inserted_notes.remove(&id);
        self.deleted_notes.remove(&id);
    }

    /// Drops pending state for a notebook and the notes inserted under it.
    fn forget_notebook(&mut self, id: NotebookId) -> Vec<NoteId> {
        self.edits.remove(&FieldKey::NotebookName(id));
        self.inserted_notebooks.remove(&id);
        self.deleted_notebooks.remove(&id);
        let orphaned: Vec<NoteId> = self
            .inserted_notes
            .values()
            .filter(|note| note.notebook_id() == id)
            .map(Note::id)
            .collect();
        for note_id in &orphaned {
            self.forget_note(*note_id);
        }
        orphaned
    }

    fn overlay_notebook(&self, mut notebook: Notebook) -> Notebook {
        if let Some(PendingEdit {
            value: FieldValue::Text(Some(name)),
            ..
        }) = self.edits.get(&FieldKey::NotebookName(notebook.id()))
        {
            notebook.set_name(name.clone());
        }
        notebook
    }

    fn overlay_note(&self, mut note: Note) -> Note {
        if let Some(PendingEdit {
            value: FieldValue::Text(Some(text)),
            ..
        }) = self.edits.get(&FieldKey::NoteText(note.id()))
        {
            note.set_text(text.clone());
        }
        if let Some(PendingEdit {
            value: FieldValue::AttributedText(text),
            ..
        }) = self.edits.get(&FieldKey::NoteAttributedText(note.id()))
        {
            note.set_attributed_text(text.clone());
        }
        note
    }

    fn note_hidden(&self, note: &Note) -> bool {
        self.deleted_notes.contains(&note.id())
            || self.deleted_notebooks.contains(&note.notebook_id())
    }
}

pub(crate) struct ContextInner {
    kind: ContextKind,
    policy: MergePolicy,
    merges_automatically: bool,
    store: Arc<StoreCoordinator>,
    pending: Mutex<PendingChanges>,
    events: broadcast::Sender<ContextChange>,
}

/// A staging area for changes against the shared store.
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct ObjectContext {
    inner: Arc<ContextInner>,
}

impl ObjectContext {
    pub(crate) fn new(
        store: Arc<StoreCoordinator>,
        kind: ContextKind,
        policy: MergePolicy,
    ) -> StoreResult<Self> {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let inner = Arc::new(ContextInner {
            kind,
            policy,
            merges_automatically: true,
            store,
            pending: Mutex::new(PendingChanges::default()),
            events,
        });
        inner.store.register(&inner)?;
        Ok(Self { inner })
    }

    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.inner.policy
    }

    /// Registers an observer for this context's changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ContextChange> {
        self.inner.events.subscribe()
    }

    /// Returns whether there are uncommitted changes.
    ///
    /// A poisoned context reports `true` so that `save()` surfaces the error.
    pub fn has_changes(&self) -> bool {
        match self.inner.pending.lock() {
            Ok(pending) => !pending.is_empty(),
            Err(_) => {
                warn!(
                    "event=context_has_changes module=store status=error context={} error_code=lock_poisoned",
                    self.kind().as_str()
                );
                true
            }
        }
    }

    /// Inserts a new notebook. Its `creation_date` is stamped before `name`
    /// is applied.
    pub fn insert_notebook(&self, name: impl Into<String>) -> StoreResult<Notebook> {
        let mut notebook = materialize(Notebook::blank());
        notebook.set_name(name.into());

        self.lock_pending()?
            .inserted_notebooks
            .insert(notebook.id(), notebook.clone());
        self.notify(
            ChangeOrigin::Local,
            ChangeSet::inserted(ObjectRef::Notebook(notebook.id())),
        );
        Ok(notebook)
    }

    /// Inserts a placeholder note under `notebook_id`.
    pub fn insert_note(&self, notebook_id: NotebookId) -> StoreResult<Note> {
        let note = {
            let mut pending = self.lock_pending()?;
            if !self.notebook_visible(&pending, notebook_id)? {
                return Err(StoreError::NotebookNotFound(notebook_id));
            }
            let note = materialize(Note::placeholder(notebook_id));
            pending.inserted_notes.insert(note.id(), note.clone());
            note
        };
        self.notify(
            ChangeOrigin::Local,
            ChangeSet::inserted(ObjectRef::Note(note.id())),
        );
        Ok(note)
    }

    pub fn set_notebook_name(&self, id: NotebookId, name: impl Into<String>) -> StoreResult<()> {
        self.set_field(FieldKey::NotebookName(id), FieldValue::Text(Some(name.into())))
    }

    /// Replaces the legacy plain-text body.
    pub fn set_note_text(&self, id: NoteId, text: impl Into<String>) -> StoreResult<()> {
        self.set_field(FieldKey::NoteText(id), FieldValue::Text(Some(text.into())))
    }

    pub fn set_note_attributed_text(&self, id: NoteId, text: AttributedText) -> StoreResult<()> {
        self.set_field(FieldKey::NoteAttributedText(id), FieldValue::AttributedText(text))
    }

    /// Marks a note for deletion.
    pub fn delete_note(&self, id: NoteId) -> StoreResult<()> {
        {
            let mut pending = self.lock_pending()?;
            if pending.inserted_notes.contains_key(&id) {
                pending.forget_note(id);
            } else {
                let stored = self.with_connection(|conn| records::select_note(conn, id))?;
                match stored {
                    Some(note) if !pending.note_hidden(&note) => {
                        pending.forget_note(id);
                        pending.deleted_notes.insert(id);
                    }
                    _ => return Err(StoreError::NoteNotFound(id)),
                }
            }
        }
        self.notify(
            ChangeOrigin::Local,
            ChangeSet::deleted(vec![ObjectRef::Note(id)]),
        );
        Ok(())
    }

    /// Marks a notebook for deletion; its notes go with it.
    pub fn delete_notebook(&self, id: NotebookId) -> StoreResult<()> {
        let mut removed = Vec::new();
        {
            let mut pending = self.lock_pending()?;
            if pending.inserted_notebooks.contains_key(&id) {
                removed.extend(pending.forget_notebook(id).into_iter().map(ObjectRef::Note));
            } else {
                if pending.deleted_notebooks.contains(&id) {
                    return Err(StoreError::NotebookNotFound(id));
                }
                let stored_notes = self.with_connection(|conn| {
                    match records::select_notebook(conn, id)? {
                        Some(_) => records::select_note_ids(conn, id).map(Some),
                        None => Ok(None),
                    }
                })?;
                let Some(stored_notes) = stored_notes else {
                    return Err(StoreError::NotebookNotFound(id));
                };
                removed.extend(pending.forget_notebook(id).into_iter().map(ObjectRef::Note));
                for note_id in stored_notes {
                    let already_deleted = pending.deleted_notes.contains(&note_id);
                    pending.forget_note(note_id);
                    if !already_deleted {
                        removed.push(ObjectRef::Note(note_id));
                    }
                }
                pending.deleted_notebooks.insert(id);
            }
        }
        removed.push(ObjectRef::Notebook(id));
        self.notify(ChangeOrigin::Local, ChangeSet::deleted(removed));
        Ok(())
    }

    /// Lists notebooks, newest first.
    pub fn fetch_notebooks(&self) -> StoreResult<Vec<Notebook>> {
        let pending = self.lock_pending()?;
        let stored = self.with_connection(records::select_notebooks)?;
        let mut notebooks: Vec<Notebook> = stored
            .into_iter()
            .filter(|notebook| !pending.deleted_notebooks.contains(&notebook.id()))
            .map(|notebook| pending.overlay_notebook(notebook))
            .chain(pending.inserted_notebooks.values().cloned())
            .collect();
        notebooks.sort_by(|a, b| {
            b.creation_date()
                .cmp(&a.creation_date())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(notebooks)
    }

    /// Lists the notes of one notebook, newest first.
    ///
    /// Fails with `NotebookNotFound` when the notebook is gone.
    pub fn fetch_notes(&self, notebook_id: NotebookId) -> StoreResult<Vec<Note>> {
        let pending = self.lock_pending()?;
        if !self.notebook_visible(&pending, notebook_id)? {
            return Err(StoreError::NotebookNotFound(notebook_id));
        }
        let stored = self.with_connection(|conn| records::select_notes(conn, notebook_id))?;
        let mut notes: Vec<Note> = stored
            .into_iter()
            .filter(|note| !pending.note_hidden(note))
            .map(|note| pending.overlay_note(note))
            .chain(
                pending
                    .inserted_notes
                    .values()
                    .filter(|note| note.notebook_id() == notebook_id)
                    .cloned(),
            )
            .collect();
        notes.sort_by(|a, b| {
            b.creation_date()
                .cmp(&a.creation_date())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(notes)
    }

    pub fn count_notes(&self, notebook_id: NotebookId) -> StoreResult<usize> {
        self.fetch_notes(notebook_id).map(|notes| notes.len())
    }

    pub fn get_notebook(&self, id: NotebookId) -> StoreResult<Option<Notebook>> {
        let pending = self.lock_pending()?;
        if let Some(notebook) = pending.inserted_notebooks.get(&id) {
            return Ok(Some(notebook.clone()));
        }
        if pending.deleted_notebooks.contains(&id) {
            return Ok(None);
        }
        let stored = self.with_connection(|conn| records::select_notebook(conn, id))?;
        Ok(stored.map(|notebook| pending.overlay_notebook(notebook)))
    }

    pub fn get_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        let pending = self.lock_pending()?;
        if let Some(note) = pending.inserted_notes.get(&id) {
            return Ok(Some(note.clone()));
        }
        let stored = self.with_connection(|conn| records::select_note(conn, id))?;
        Ok(stored
            .filter(|note| !pending.note_hidden(note))
            .map(|note| pending.overlay_note(note)))
    }

    /// Commits pending changes in one transaction and merges them into the
    /// other contexts.
    ///
    /// On failure nothing is committed and pending changes are kept.
    pub fn save(&self) -> StoreResult<ChangeSet> {
        let started_at = Instant::now();
        let mut pending = self.lock_pending()?;
        if pending.is_empty() {
            return Ok(ChangeSet::default());
        }

        let result = {
            let mut conn = self.inner.store.lock_connection()?;
            commit_pending(&mut conn, &pending, self.inner.policy)
        };
        let (committed, conflicts) = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    "event=context_save module=store status=error context={} duration_ms={} error={}",
                    self.kind().as_str(),
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        *pending = PendingChanges::default();
        drop(pending);

        info!(
            "event=context_save module=store status=ok context={} inserted={} updated={} deleted={} conflicts={} duration_ms={}",
            self.kind().as_str(),
            committed.inserted.len(),
            committed.updated.len(),
            committed.deleted.len(),
            conflicts,
            started_at.elapsed().as_millis()
        );

        self.notify(ChangeOrigin::Saved, committed.clone());
        self.inner.store.publish(&self.inner, &committed);
        Ok(committed)
    }

    /// Discards every pending change.
    pub fn rollback(&self) -> StoreResult<()> {
        let discarded = {
            let mut pending = self.lock_pending()?;
            let discarded = ChangeSet {
                inserted: pending
                    .deleted_notebooks
                    .iter()
                    .map(|id| ObjectRef::Notebook(*id))
                    .chain(pending.deleted_notes.iter().map(|id| ObjectRef::Note(*id)))
                    .collect(),
                updated: pending
                    .edits
                    .iter()
                    .map(|(key, edit)| FieldUpdate {
                        key: *key,
                        value: edit.base.clone(),
                    })
                    .collect(),
                deleted: pending
                    .inserted_notebooks
                    .keys()
                    .map(|id| ObjectRef::Notebook(*id))
                    .chain(pending.inserted_notes.keys().map(|id| ObjectRef::Note(*id)))
                    .collect(),
            };
            *pending = PendingChanges::default();
            discarded
        };
        if !discarded.is_empty() {
            debug!(
                "event=context_rollback module=store status=ok context={} discarded={}",
                self.kind().as_str(),
                discarded.len()
            );
            self.notify(ChangeOrigin::Local, discarded);
        }
        Ok(())
    }

    /// Folds another context's committed changes into this context.
    ///
    /// Pending edits on updated fields are resolved with this context's
    /// merge policy unless they are already based on the incoming value;
    /// pending state for deleted objects is dropped.
    pub fn merge_changes(&self, changes: &ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut dropped_edits = 0usize;
        {
            let mut pending = self.lock_pending()?;
            for update in &changes.updated {
                let Some(edit) = pending.edits.get_mut(&update.key) else {
                    continue;
                };
                let keep = match self.inner.policy.resolve() {
                    Resolution::KeepPending => {
                        edit.base = update.value.clone();
                        edit.value != edit.base
                    }
                    // An edit already based on the incoming value does not conflict.
                    Resolution::TakeStored => edit.base == update.value,
                };
                if !keep {
                    pending.edits.remove(&update.key);
                    dropped_edits += 1;
                }
            }
            for object in &changes.deleted {
                match object {
                    ObjectRef::Note(id) => pending.forget_note(*id),
                    ObjectRef::Notebook(id) => {
                        pending.forget_notebook(*id);
                    }
                }
            }
        }

        debug!(
            "event=context_merge module=store status=ok context={} policy={} changes={} dropped_edits={}",
            self.kind().as_str(),
            self.inner.policy.as_str(),
            changes.len(),
            dropped_edits
        );
        self.notify(ChangeOrigin::Merged, changes.clone());
        Ok(())
    }

    fn set_field(&self, key: FieldKey, value: FieldValue) -> StoreResult<()> {
        {
            let mut pending = self.lock_pending()?;
            if apply_to_inserted(&mut pending, key, &value) {
                drop(pending);
                self.notify(ChangeOrigin::Local, ChangeSet::updated(key, value));
                return Ok(());
            }

            let stored = self.with_connection(|conn| stored_field(conn, &pending, key))?;
            let Some(stored) = stored else {
                return Err(not_found(key));
            };

            match pending.edits.get_mut(&key) {
                Some(edit) => edit.value = value.clone(),
                None => {
                    pending.edits.insert(
                        key,
                        PendingEdit {
                            value: value.clone(),
                            base: stored,
                        },
                    );
                }
            }
            if pending
                .edits
                .get(&key)
                .is_some_and(|edit| edit.value == edit.base)
            {
                pending.edits.remove(&key);
            }
        }
        self.notify(ChangeOrigin::Local, ChangeSet::updated(key, value));
        Ok(())
    }

    fn notebook_visible(&self, pending: &PendingChanges, id: NotebookId) -> StoreResult<bool> {
        if pending.inserted_notebooks.contains_key(&id) {
            return Ok(true);
        }
        if pending.deleted_notebooks.contains(&id) {
            return Ok(false);
        }
        let stored = self.with_connection(|conn| records::select_notebook(conn, id))?;
        Ok(stored.is_some())
    }

    fn with_connection<T>(
        &self,
        read: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.inner.store.lock_connection()?;
        read(&conn)
    }

    fn lock_pending(&self) -> StoreResult<MutexGuard<'_, PendingChanges>> {
        self.inner
            .pending
            .lock()
            .map_err(|_| StoreError::LockPoisoned("context"))
    }

    fn notify(&self, origin: ChangeOrigin, changes: ChangeSet) {
        // No receivers is fine: nobody is observing this context.
        let _ = self.inner.events.send(ContextChange { origin, changes });
    }
}

/// Writes `pending` in one immediate transaction.
///
/// Returns the committed change set and the number of conflicting fields.
fn commit_pending(
    conn: &mut Connection,
    pending: &PendingChanges,
    policy: MergePolicy,
) -> StoreResult<(ChangeSet, usize)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut committed = ChangeSet::default();
    let mut conflicts = 0usize;

    for notebook in pending.inserted_notebooks.values() {
        records::insert_notebook(&tx, notebook)?;
        committed.inserted.push(ObjectRef::Notebook(notebook.id()));
    }
    for note in pending.inserted_notes.values() {
        records::insert_note(&tx, note)?;
        committed.inserted.push(ObjectRef::Note(note.id()));
    }

    for (key, edit) in &pending.edits {
        let Some(stored) = records::read_field(&tx, *key)? else {
            debug!(
                "event=context_save module=store status=skip field={} reason=row_missing",
                key.column()
            );
            continue;
        };
        if stored != edit.base {
            conflicts += 1;
            if policy.resolve() == Resolution::TakeStored {
                continue;
            }
        }
        if records::write_field(&tx, *key, &edit.value)? {
            committed.updated.push(FieldUpdate {
                key: *key,
                value: edit.value.clone(),
            });
        }
    }

    for id in &pending.deleted_notes {
        if records::delete_note(&tx, *id)? {
            committed.deleted.push(ObjectRef::Note(*id));
        }
    }
    for id in &pending.deleted_notebooks {
        if let Some(cascaded) = records::delete_notebook(&tx, *id)? {
            committed
                .deleted
                .extend(cascaded.into_iter().map(ObjectRef::Note));
            committed.deleted.push(ObjectRef::Notebook(*id));
        }
    }

    tx.commit()?;
    Ok((committed, conflicts))
}

fn apply_to_inserted(pending: &mut PendingChanges, key: FieldKey, value: &FieldValue) -> bool {
    match (key, value) {
        (FieldKey::NotebookName(id), FieldValue::Text(Some(name))) => {
            match pending.inserted_notebooks.get_mut(&id) {
                Some(notebook) => {
                    notebook.set_name(name.clone());
                    true
                }
                None => false,
            }
        }
        (FieldKey::NoteText(id), FieldValue::Text(Some(text))) => {
            match pending.inserted_notes.get_mut(&id) {
                Some(note) => {
                    note.set_text(text.clone());
                    true
                }
                None => false,
            }
        }
        (FieldKey::NoteAttributedText(id), FieldValue::AttributedText(text)) => {
            match pending.inserted_notes.get_mut(&id) {
                Some(note) => {
                    note.set_attributed_text(text.clone());
                    true
                }
                None => false,
            }
        }
        _ => false,
    }
}

/// Reads the stored value of a field that is still visible to the context.
fn stored_field(
    conn: &Connection,
    pending: &PendingChanges,
    key: FieldKey,
) -> StoreResult<Option<FieldValue>> {
    match key {
        FieldKey::NotebookName(id) if pending.deleted_notebooks.contains(&id) => Ok(None),
        FieldKey::NoteText(id) | FieldKey::NoteAttributedText(id) => {
            match records::select_note(conn, id)? {
                Some(note) if !pending.note_hidden(&note) => records::read_field(conn, key),
                _ => Ok(None),
            }
        }
        FieldKey::NotebookName(_) => records::read_field(conn, key),
    }
}

fn not_found(key: FieldKey) -> StoreError {
    match key.object() {
        ObjectRef::Notebook(id) => StoreError::NotebookNotFound(id),
        ObjectRef::Note(id) => StoreError::NoteNotFound(id),
    }
}
