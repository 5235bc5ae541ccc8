//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically, including data-rewriting policies.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A policy step runs once, inside the same transaction as its DDL.

mod attributed_text_policy;

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};

type MigrationPolicy = fn(&Transaction<'_>, u32) -> DbResult<()>;

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
    /// Row-level rewrite executed after `sql`.
    policy: Option<MigrationPolicy>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_init.sql"),
        policy: None,
    },
    Migration {
        version: 2,
        sql: include_str!("0002_attributed_text.sql"),
        policy: Some(attributed_text_policy::copy_text_into_attributed_text),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_migrations_to(conn, latest_version())
}

/// Applies pending migrations up to and including `target`.
///
/// Useful to materialize a legacy schema before upgrading it.
pub fn apply_migrations_to(conn: &mut Connection, target: u32) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    let target = target.min(latest);
    if current_version >= target {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version || migration.version > target {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        if let Some(policy) = migration.policy {
            policy(&tx, migration.version)?;
        }
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=ok version={}",
            migration.version
        );
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
