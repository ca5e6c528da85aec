//! PRAGMA configuration for write and read connections.

use docscope_core::errors::StorageError;
use rusqlite::Connection;

use crate::sqlite_err;

/// Write connection: WAL, NORMAL sync, 5s busy timeout, foreign keys on.
pub fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -16000;
        PRAGMA temp_store = MEMORY;
        ",
    )
    .map_err(sqlite_err)
}

/// Read connections only need to wait on the writer and keep a cache.
pub fn apply_read_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -8000;
        PRAGMA query_only = ON;
        ",
    )
    .map_err(sqlite_err)
}

pub fn verify_wal_mode(conn: &Connection) -> Result<bool, StorageError> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(sqlite_err)?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
