//! SQL reads and writes for notebook and note rows.
//!
//! # Invariants
//! - Lists are ordered by `creation_date DESC`.
//! - `attributed_text` is stored as JSON; NULL decodes to empty text.
//! - Callers pass either a plain connection or an open transaction.

use crate::model::attributed_text::AttributedText;
use crate::model::note::{Note, NoteId};
use crate::model::notebook::{Notebook, NotebookId};
use crate::store::changes::{FieldKey, FieldValue};
use crate::store::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const NOTEBOOK_SELECT_SQL: &str = "SELECT
    id,
    name,
    creation_date
FROM notebooks";

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    notebook_id,
    text,
    attributed_text,
    creation_date
FROM notes";

pub(crate) fn insert_notebook(conn: &Connection, notebook: &Notebook) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO notebooks (id, name, creation_date) VALUES (?1, ?2, ?3);",
        params![
            notebook.id().to_string(),
            notebook.name(),
            notebook.creation_date()
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_note(conn: &Connection, note: &Note) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO notes (
            id,
            notebook_id,
            text,
            attributed_text,
            creation_date
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            note.id().to_string(),
            note.notebook_id().to_string(),
            note.text(),
            encode_attributed_text(note.attributed_text())?,
            note.creation_date(),
        ],
    )?;
    Ok(())
}

pub(crate) fn select_notebooks(conn: &Connection) -> StoreResult<Vec<Notebook>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTEBOOK_SELECT_SQL} ORDER BY creation_date DESC, id ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut notebooks = Vec::new();
    while let Some(row) = rows.next()? {
        notebooks.push(parse_notebook_row(row)?);
    }
    Ok(notebooks)
}

pub(crate) fn select_notebook(conn: &Connection, id: NotebookId) -> StoreResult<Option<Notebook>> {
    let mut stmt = conn.prepare(&format!("{NOTEBOOK_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_notebook_row(row)?));
    }
    Ok(None)
}

pub(crate) fn select_notes(conn: &Connection, notebook_id: NotebookId) -> StoreResult<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}
         WHERE notebook_id = ?1
         ORDER BY creation_date DESC, id ASC;"
    ))?;
    let mut rows = stmt.query([notebook_id.to_string()])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

pub(crate) fn select_note(conn: &Connection, id: NoteId) -> StoreResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

pub(crate) fn select_note_ids(conn: &Connection, notebook_id: NotebookId) -> StoreResult<Vec<NoteId>> {
    let mut stmt = conn.prepare("SELECT id FROM notes WHERE notebook_id = ?1;")?;
    let mut rows = stmt.query([notebook_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "notes.id")?);
    }
    Ok(ids)
}

/// Reads the stored value of one field. `None` when the row is gone.
pub(crate) fn read_field(conn: &Connection, key: FieldKey) -> StoreResult<Option<FieldValue>> {
    match key {
        FieldKey::NotebookName(id) => {
            let name = conn
                .query_row(
                    "SELECT name FROM notebooks WHERE id = ?1;",
                    [id.to_string()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(name.map(|value| FieldValue::Text(Some(value))))
        }
        FieldKey::NoteText(id) => {
            let text = conn
                .query_row(
                    "SELECT text FROM notes WHERE id = ?1;",
                    [id.to_string()],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?;
            Ok(text.map(FieldValue::Text))
        }
        FieldKey::NoteAttributedText(id) => {
            let raw = conn
                .query_row(
                    "SELECT attributed_text FROM notes WHERE id = ?1;",
                    [id.to_string()],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?;
            match raw {
                Some(raw) => Ok(Some(FieldValue::AttributedText(decode_attributed_text(
                    raw.as_deref(),
                )?))),
                None => Ok(None),
            }
        }
    }
}

/// Writes one field. Returns `false` when the row no longer exists.
pub(crate) fn write_field(conn: &Connection, key: FieldKey, value: &FieldValue) -> StoreResult<bool> {
    let changed = match (key, value) {
        (FieldKey::NotebookName(id), FieldValue::Text(Some(name))) => conn.execute(
            "UPDATE notebooks SET name = ?1 WHERE id = ?2;",
            params![name, id.to_string()],
        )?,
        (FieldKey::NoteText(id), FieldValue::Text(text)) => conn.execute(
            "UPDATE notes SET text = ?1 WHERE id = ?2;",
            params![text, id.to_string()],
        )?,
        (FieldKey::NoteAttributedText(id), FieldValue::AttributedText(text)) => conn.execute(
            "UPDATE notes SET attributed_text = ?1 WHERE id = ?2;",
            params![encode_attributed_text(text)?, id.to_string()],
        )?,
        (key, _) => {
            return Err(StoreError::InvalidData(format!(
                "value type does not match field {}",
                key.column()
            )))
        }
    };
    Ok(changed > 0)
}

/// Deletes one note. Returns `false` when the row no longer exists.
pub(crate) fn delete_note(conn: &Connection, id: NoteId) -> StoreResult<bool> {
    let changed = conn.execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
    Ok(changed > 0)
}

/// Deletes one notebook and, through the foreign key cascade, its notes.
///
/// Returns the ids of the cascaded notes, or `None` when the notebook row
/// no longer exists.
pub(crate) fn delete_notebook(conn: &Connection, id: NotebookId) -> StoreResult<Option<Vec<NoteId>>> {
    let cascaded = select_note_ids(conn, id)?;
    let changed = conn.execute("DELETE FROM notebooks WHERE id = ?1;", [id.to_string()])?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(cascaded))
}

/// Newest `creation_date` across both tables.
pub(crate) fn max_creation_date(conn: &Connection) -> StoreResult<Option<i64>> {
    let value = conn.query_row(
        "SELECT MAX(creation_date) FROM (
            SELECT creation_date FROM notebooks
            UNION ALL
            SELECT creation_date FROM notes
        );",
        [],
        |row| row.get::<_, Option<i64>>(0),
    )?;
    Ok(value)
}

fn parse_notebook_row(row: &Row<'_>) -> StoreResult<Notebook> {
    let id_text: String = row.get("id")?;
    Ok(Notebook::from_parts(
        parse_uuid(&id_text, "notebooks.id")?,
        row.get("name")?,
        row.get("creation_date")?,
    ))
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<Note> {
    let id_text: String = row.get("id")?;
    let notebook_text: String = row.get("notebook_id")?;
    let attributed: Option<String> = row.get("attributed_text")?;
    Ok(Note::from_parts(
        parse_uuid(&id_text, "notes.id")?,
        parse_uuid(&notebook_text, "notes.notebook_id")?,
        row.get("text")?,
        decode_attributed_text(attributed.as_deref())?,
        row.get("creation_date")?,
    ))
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn encode_attributed_text(value: &AttributedText) -> StoreResult<String> {
    value
        .to_json()
        .map_err(|err| StoreError::InvalidData(format!("cannot encode attributed text: {err}")))
}

fn decode_attributed_text(raw: Option<&str>) -> StoreResult<AttributedText> {
    match raw {
        Some(raw) => AttributedText::from_json(raw).map_err(|err| {
            StoreError::InvalidData(format!("invalid notes.attributed_text value: {err}"))
        }),
        None => Ok(AttributedText::default()),
    }
}
