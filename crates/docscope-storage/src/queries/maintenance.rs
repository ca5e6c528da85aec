//! Health checks over the knowledge database.

use docscope_core::errors::StorageError;
use rusqlite::Connection;

use crate::sqlite_err;

/// `PRAGMA integrity_check`. True when SQLite reports `ok`.
pub fn integrity_check(conn: &Connection) -> Result<bool, StorageError> {
    let result: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(sqlite_err)?;
    Ok(result == "ok")
}

/// Entries whose provenance row is missing. A healthy store has none.
pub fn orphaned_entries(conn: &Connection) -> Result<usize, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM knowledge_base_entries e
         WHERE NOT EXISTS (
             SELECT 1 FROM provenance_records p
             WHERE p.entity_type = e.entity_type AND p.entity_id = e.entity_id
         )",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as usize)
    .map_err(sqlite_err)
}
