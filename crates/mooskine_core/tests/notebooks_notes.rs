use mooskine_core::{
    AttributedText, Color, NoteService, NotebookService, PatternFill, StoreConfig, StoreError,
    StoreHandle, StoreLocation, UserAction, PLACEHOLDER_NOTE_TEXT,
};
use uuid::Uuid;

fn services() -> (StoreHandle, NotebookService, NoteService) {
    let store = StoreHandle::open_in_memory().unwrap();
    let notebooks = NotebookService::new(store.main_context().clone());
    let notes = NoteService::new(store.clone());
    (store, notebooks, notes)
}

#[test]
fn deleting_notebook_cascades_to_its_notes_only() {
    let (store, notebooks, notes) = services();
    let groceries = notebooks.add_notebook("Groceries").unwrap();
    let work = notebooks.add_notebook("Work").unwrap();
    let milk = notes.add_note(groceries.id()).unwrap();
    let eggs = notes.add_note(groceries.id()).unwrap();
    let report = notes.add_note(work.id()).unwrap();

    notebooks.delete_notebook(groceries.id()).unwrap();

    let context = store.main_context();
    assert!(context.get_note(milk.id()).unwrap().is_none());
    assert!(context.get_note(eggs.id()).unwrap().is_none());
    assert!(context.get_note(report.id()).unwrap().is_some());
    assert_eq!(context.count_notes(work.id()).unwrap(), 1);
    assert!(!context.has_changes());
}

#[test]
fn groceries_scenario_leaves_no_trace_of_note() {
    let (store, notebooks, notes) = services();
    let groceries = notebooks.add_notebook("Groceries").unwrap();
    let note = notes.add_note(groceries.id()).unwrap();
    assert_eq!(note.text(), Some(PLACEHOLDER_NOTE_TEXT));
    assert_eq!(
        note.attributed_text().to_plain_string(),
        PLACEHOLDER_NOTE_TEXT
    );

    notebooks.delete_notebook(groceries.id()).unwrap();

    let err = notes.list_notes(groceries.id()).unwrap_err();
    assert!(matches!(err, StoreError::NotebookNotFound(id) if id == groceries.id()));
    assert!(notes.get_note(note.id()).unwrap().is_none());
    // The background context sees the same committed state.
    assert!(store.background_context().get_note(note.id()).unwrap().is_none());
}

#[test]
fn creation_date_is_set_once_and_survives_edits() {
    let (_store, notebooks, notes) = services();
    let notebook = notebooks.add_notebook("Journal").unwrap();
    assert!(notebook.creation_date() > 0);
    let note = notes.add_note(notebook.id()).unwrap();
    let created_at = note.creation_date();
    assert!(created_at > notebook.creation_date());

    notes
        .finish_editing(note.id(), AttributedText::plain("Dear diary"))
        .unwrap();
    notes.apply_bold(note.id(), 0..4).unwrap();
    let edited = notes.apply_red_underline(note.id(), 5..10).unwrap();

    assert_eq!(edited.creation_date(), created_at);
    assert_eq!(edited.attributed_text().to_plain_string(), "Dear diary");
    assert!(edited.attributed_text().runs()[0].attributes.bold);
    assert_eq!(
        edited.attributed_text().runs()[2].attributes.underline_color,
        Some(Color::RED)
    );
    assert_eq!(
        notes.get_note(note.id()).unwrap().unwrap().creation_date(),
        created_at
    );
}

#[test]
fn notes_are_listed_newest_first() {
    let (_store, notebooks, notes) = services();
    let notebook = notebooks.add_notebook("Ideas").unwrap();
    let created: Vec<Uuid> = (0..5)
        .map(|_| notes.add_note(notebook.id()).unwrap().id())
        .collect();

    let listed = notes.list_notes(notebook.id()).unwrap();
    let listed_ids: Vec<Uuid> = listed.iter().map(|item| item.note.id()).collect();
    let mut expected = created.clone();
    expected.reverse();
    assert_eq!(listed_ids, expected);
    assert!(listed
        .windows(2)
        .all(|pair| pair[0].note.creation_date() > pair[1].note.creation_date()));
    assert_eq!(listed[0].preview, PLACEHOLDER_NOTE_TEXT);
}

#[test]
fn unsaved_notes_are_ordered_with_saved_ones() {
    let (store, notebooks, notes) = services();
    let notebook = notebooks.add_notebook("Mixed").unwrap();
    let saved = notes.add_note(notebook.id()).unwrap();
    let pending = store.main_context().insert_note(notebook.id()).unwrap();

    let listed = store.main_context().fetch_notes(notebook.id()).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id(), pending.id());
    assert_eq!(listed[1].id(), saved.id());
    assert!(store.main_context().has_changes());
}

#[test]
fn notebooks_are_listed_newest_first_with_counts() {
    let (_store, notebooks, notes) = services();
    let older = notebooks.add_notebook("Older").unwrap();
    let newer = notebooks.add_notebook("Newer").unwrap();
    notes.add_note(older.id()).unwrap();
    notes.add_note(older.id()).unwrap();

    let summaries = notebooks.list_notebooks().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].notebook.id(), newer.id());
    assert_eq!(summaries[0].note_count, 0);
    assert_eq!(summaries[1].notebook.id(), older.id());
    assert_eq!(summaries[1].note_count, 2);
}

#[test]
fn adding_note_to_missing_notebook_reports_action_error() {
    let (_store, _notebooks, notes) = services();
    let missing = Uuid::new_v4();

    let err = notes.add_note(missing).unwrap_err();
    assert_eq!(err.action, UserAction::AddNote);
    assert_eq!(err.title(), "Unable to Add Note");
    assert!(err.message().contains(&missing.to_string()));
}

#[test]
fn blank_notebook_name_is_rejected() {
    let (store, notebooks, _notes) = services();
    let err = notebooks.add_notebook("   ").unwrap_err();
    assert_eq!(err.action, UserAction::AddNotebook);
    assert!(matches!(err.source, StoreError::InvalidInput(_)));
    assert!(!store.main_context().has_changes());
}

#[test]
fn deleting_note_removes_it_from_list() {
    let (_store, notebooks, notes) = services();
    let notebook = notebooks.add_notebook("Todo").unwrap();
    let keep = notes.add_note(notebook.id()).unwrap();
    let drop_me = notes.add_note(notebook.id()).unwrap();

    notes.delete_note(drop_me.id()).unwrap();

    let listed = notes.list_notes(notebook.id()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].note.id(), keep.id());

    let err = notes.delete_note(drop_me.id()).unwrap_err();
    assert_eq!(err.action, UserAction::DeleteNote);
}

#[tokio::test(flavor = "multi_thread")]
async fn cow_pattern_is_applied_in_background_and_merged_into_main() {
    let (store, notebooks, notes) = services();
    let notebook = notebooks.add_notebook("Farm").unwrap();
    let note = notes.add_note(notebook.id()).unwrap();
    notes
        .finish_editing(note.id(), AttributedText::plain("moo moo"))
        .unwrap();

    let mut observer = store.main_context().subscribe();
    let patterned = notes.apply_cow_pattern(note.id(), 0..3).await.unwrap();

    let runs = patterned.attributed_text().runs();
    assert_eq!(runs[0].text, "moo");
    assert_eq!(runs[0].attributes.pattern_fill, Some(PatternFill::Cow));
    assert_eq!(runs[1].text, " moo");
    assert!(!store.main_context().has_changes());

    let change = observer.try_recv().unwrap();
    assert_eq!(change.origin, mooskine_core::ChangeOrigin::Merged);
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::on_disk(dir.path().join("data"), "Mooskine");
    let note_id = {
        let store = StoreHandle::open(&config).unwrap();
        assert_eq!(
            store.location(),
            &StoreLocation::File(dir.path().join("data").join("Mooskine.sqlite"))
        );
        let notebooks = NotebookService::new(store.main_context().clone());
        let notes = NoteService::new(store.clone());
        let notebook = notebooks.add_notebook("Travel").unwrap();
        let note = notes.add_note(notebook.id()).unwrap();
        notes
            .finish_editing(note.id(), AttributedText::plain("Pack socks"))
            .unwrap();
        note.id()
    };

    let store = StoreHandle::open(&config).unwrap();
    let note = store.main_context().get_note(note_id).unwrap().unwrap();
    assert_eq!(note.attributed_text().to_plain_string(), "Pack socks");

    let fresh = store
        .main_context()
        .insert_notebook("After reopen")
        .unwrap();
    assert!(fresh.creation_date() > note.creation_date());
}
