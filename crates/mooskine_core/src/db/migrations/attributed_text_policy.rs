//! One-time upgrade from plain note text to attributed text.
//!
//! Every legacy row with a non-null `text` gets an unstyled
//! `attributed_text` wrapping that text. `text` itself is left untouched.

use crate::db::{DbError, DbResult};
use crate::model::attributed_text::AttributedText;
use log::info;
use rusqlite::{params, Transaction};

pub(super) fn copy_text_into_attributed_text(tx: &Transaction<'_>, version: u32) -> DbResult<()> {
    let legacy_rows = {
        let mut stmt = tx.prepare("SELECT id, text FROM notes WHERE text IS NOT NULL;")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for (id, text) in &legacy_rows {
        let attributed = AttributedText::plain(text.as_str())
            .to_json()
            .map_err(|err| DbError::Migration {
                version,
                message: format!("cannot encode attributed text for note {id}: {err}"),
            })?;
        tx.execute(
            "UPDATE notes SET attributed_text = ?1 WHERE id = ?2;",
            params![attributed, id],
        )?;
    }

    info!(
        "event=db_migrate_policy module=db status=ok version={} policy=attributed_text rows={}",
        version,
        legacy_rows.len()
    );
    Ok(())
}
