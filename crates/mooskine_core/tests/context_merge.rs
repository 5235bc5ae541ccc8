use mooskine_core::{
    AttributedText, ChangeOrigin, ChangeSet, ContextKind, MergePolicy, Note, Notebook,
    ObjectContext, ObjectRef, StoreError, StoreHandle, StoreResult,
};
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

fn store_with_note() -> (StoreHandle, Notebook, Note) {
    let store = StoreHandle::open_in_memory().unwrap();
    let main = store.main_context();
    let notebook = main.insert_notebook("Shared").unwrap();
    let note = main.insert_note(notebook.id()).unwrap();
    main.save().unwrap();
    (store, notebook, note)
}

fn plain_text_of(context: &ObjectContext, note_id: Uuid) -> String {
    context
        .get_note(note_id)
        .unwrap()
        .unwrap()
        .attributed_text()
        .to_plain_string()
}

#[test]
fn contexts_have_asymmetric_merge_policies() {
    let store = StoreHandle::open_in_memory().unwrap();
    assert_eq!(store.main_context().kind(), ContextKind::Main);
    assert_eq!(store.main_context().merge_policy(), MergePolicy::StoreTrump);
    assert_eq!(store.background_context().kind(), ContextKind::Background);
    assert_eq!(
        store.background_context().merge_policy(),
        MergePolicy::ObjectTrump
    );
}

#[test]
fn background_keeps_own_edit_and_main_sees_latest_save() {
    let (store, _notebook, note) = store_with_note();
    let main = store.main_context();
    let background = store.background_context();

    main.set_note_attributed_text(note.id(), AttributedText::plain("from main"))
        .unwrap();
    background
        .set_note_attributed_text(note.id(), AttributedText::plain("from background"))
        .unwrap();

    main.save().unwrap();
    // Merging main's save keeps the background edit pending.
    assert_eq!(plain_text_of(background, note.id()), "from background");
    assert!(background.has_changes());

    background.save().unwrap();

    assert_eq!(plain_text_of(background, note.id()), "from background");
    assert_eq!(plain_text_of(main, note.id()), "from background");
    assert!(!main.has_changes());
    assert!(!background.has_changes());
}

#[test]
fn main_drops_pending_edit_when_background_save_is_merged() {
    let (store, _notebook, note) = store_with_note();
    let main = store.main_context();
    let background = store.background_context();

    main.set_note_attributed_text(note.id(), AttributedText::plain("unsaved main edit"))
        .unwrap();
    background
        .set_note_attributed_text(note.id(), AttributedText::plain("background wins"))
        .unwrap();
    background.save().unwrap();

    assert_eq!(plain_text_of(main, note.id()), "background wins");
    assert!(!main.has_changes());
    assert_eq!(plain_text_of(background, note.id()), "background wins");
}

#[test]
fn late_merge_keeps_main_edit_based_on_merged_value() {
    let (store, _notebook, note) = store_with_note();
    let main = store.main_context();
    let background = store.background_context();

    background
        .set_note_attributed_text(note.id(), AttributedText::plain("from background"))
        .unwrap();
    let committed = background.save().unwrap();

    main.set_note_attributed_text(note.id(), AttributedText::plain("main after merge"))
        .unwrap();
    // Same change set delivered again after the main edit was made.
    main.merge_changes(&committed).unwrap();

    assert_eq!(plain_text_of(main, note.id()), "main after merge");
    assert!(main.has_changes());

    main.save().unwrap();
    assert_eq!(plain_text_of(background, note.id()), "main after merge");
}

#[test]
fn background_text_edit_outlives_concurrent_main_save() {
    let (store, _notebook, note) = store_with_note();
    let main = store.main_context();
    let background = store.background_context();

    background.set_note_text(note.id(), "background text").unwrap();
    main.set_note_text(note.id(), "main text").unwrap();
    main.save().unwrap();
    background.save().unwrap();

    let stored = main.get_note(note.id()).unwrap().unwrap();
    assert_eq!(stored.text(), Some("background text"));
}

#[test]
fn edits_to_different_fields_do_not_conflict() {
    let (store, _notebook, note) = store_with_note();
    let main = store.main_context();
    let background = store.background_context();

    main.set_note_text(note.id(), "legacy body").unwrap();
    background
        .set_note_attributed_text(note.id(), AttributedText::plain("styled body"))
        .unwrap();
    background.save().unwrap();
    assert!(main.has_changes());
    main.save().unwrap();

    let merged = background.get_note(note.id()).unwrap().unwrap();
    assert_eq!(merged.text(), Some("legacy body"));
    assert_eq!(merged.attributed_text().to_plain_string(), "styled body");
}

#[test]
fn observers_are_notified_of_local_saved_and_merged_changes() {
    let store = StoreHandle::open_in_memory().unwrap();
    let main = store.main_context();
    let background = store.background_context();
    let mut main_events = main.subscribe();
    let mut background_events = background.subscribe();

    let notebook = main.insert_notebook("Observed").unwrap();
    let local = main_events.try_recv().unwrap();
    assert_eq!(local.origin, ChangeOrigin::Local);
    assert!(local.changes.touches(ObjectRef::Notebook(notebook.id())));

    main.save().unwrap();
    let saved = main_events.try_recv().unwrap();
    assert_eq!(saved.origin, ChangeOrigin::Saved);
    assert_eq!(saved.changes.inserted, vec![ObjectRef::Notebook(notebook.id())]);

    let merged = background_events.try_recv().unwrap();
    assert_eq!(merged.origin, ChangeOrigin::Merged);
    assert_eq!(merged.changes, saved.changes);

    background.set_notebook_name(notebook.id(), "Renamed").unwrap();
    background.save().unwrap();
    let merged_into_main = loop {
        let change = main_events.try_recv().unwrap();
        if change.origin == ChangeOrigin::Merged {
            break change;
        }
    };
    assert!(merged_into_main
        .changes
        .touches(ObjectRef::Notebook(notebook.id())));
    assert_eq!(
        main.get_notebook(notebook.id()).unwrap().unwrap().name(),
        "Renamed"
    );
    assert!(matches!(main_events.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn notebook_deletion_merges_into_other_context() {
    let (store, notebook, note) = store_with_note();
    let main = store.main_context();
    let background = store.background_context();

    background
        .set_note_attributed_text(note.id(), AttributedText::plain("orphan edit"))
        .unwrap();
    let orphan = background.insert_note(notebook.id()).unwrap();

    main.delete_notebook(notebook.id()).unwrap();
    let committed = main.save().unwrap();
    assert!(committed.deleted.contains(&ObjectRef::Note(note.id())));
    assert!(committed.deleted.contains(&ObjectRef::Notebook(notebook.id())));

    assert!(!background.has_changes());
    assert!(background.get_note(orphan.id()).unwrap().is_none());
    assert!(matches!(
        background.fetch_notes(notebook.id()),
        Err(StoreError::NotebookNotFound(_))
    ));
    assert!(background.save().unwrap().is_empty());
}

#[test]
fn rollback_discards_pending_changes() {
    let (store, notebook, note) = store_with_note();
    let main = store.main_context();
    let mut events = main.subscribe();

    main.set_note_text(note.id(), "scratch").unwrap();
    main.insert_note(notebook.id()).unwrap();
    main.delete_note(note.id()).unwrap();
    assert!(main.has_changes());

    main.rollback().unwrap();

    assert!(!main.has_changes());
    let notes = main.fetch_notes(notebook.id()).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].text(), note.text());

    let last = std::iter::from_fn(|| events.try_recv().ok()).last().unwrap();
    assert_eq!(last.origin, ChangeOrigin::Local);
    assert!(last.changes.inserted.contains(&ObjectRef::Note(note.id())));
}

#[test]
fn setting_field_back_to_stored_value_clears_pending_edit() {
    let (store, _notebook, note) = store_with_note();
    let main = store.main_context();

    main.set_note_attributed_text(note.id(), AttributedText::plain("changed"))
        .unwrap();
    assert!(main.has_changes());
    main.set_note_attributed_text(note.id(), note.attributed_text().clone())
        .unwrap();
    assert!(!main.has_changes());
}

#[test]
fn editing_unknown_note_fails() {
    let store = StoreHandle::open_in_memory().unwrap();
    let missing = Uuid::new_v4();
    let err = store
        .main_context()
        .set_note_text(missing, "nobody home")
        .unwrap_err();
    assert!(matches!(err, StoreError::NoteNotFound(id) if id == missing));
}

#[tokio::test(flavor = "multi_thread")]
async fn background_task_edits_are_visible_in_main() {
    let (store, _notebook, note) = store_with_note();
    let note_id = note.id();

    let saved = store
        .perform_background_task(move |background| -> StoreResult<ChangeSet> {
            background.set_note_attributed_text(note_id, AttributedText::plain("worker"))?;
            background.save()
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(saved.updated.len(), 1);
    assert_eq!(plain_text_of(store.main_context(), note_id), "worker");
}
