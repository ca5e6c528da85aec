//! Versioned schema migrations tracked in `PRAGMA user_version`.

pub mod v001_initial;
pub mod v002_scan_state;

use docscope_core::errors::StorageError;
use rusqlite::Connection;

use crate::connection::writer::with_immediate_transaction;

const MIGRATIONS: &[(u32, &str)] = &[
    (1, v001_initial::MIGRATION_SQL),
    (2, v002_scan_state::MIGRATION_SQL),
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })
}

/// Apply every migration newer than the stored `user_version`, each in its
/// own transaction. Returns the number applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, StorageError> {
    let current = current_version(conn)?;
    let mut applied = 0;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        with_immediate_transaction(conn, |conn| {
            conn.execute_batch(sql)
                .and_then(|_| conn.pragma_update(None, "user_version", version))
                .map_err(|e| StorageError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })
        })?;
        tracing::info!(version, "applied knowledge-store migration");
        applied += 1;
    }
    Ok(applied)
}
