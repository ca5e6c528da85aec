//! BEGIN IMMEDIATE transactions on the write connection.

use docscope_core::errors::StorageError;
use rusqlite::Connection;

/// Run `f` inside a `BEGIN IMMEDIATE` transaction. The write lock is taken
/// up front; any error rolls the whole batch back.
pub fn with_immediate_transaction<F, T>(conn: &Connection, f: F) -> Result<T, StorageError>
where
    F: FnOnce(&Connection) -> Result<T, StorageError>,
{
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| StorageError::SqliteError {
            message: format!("failed to begin immediate transaction: {e}"),
        })?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT").map_err(|e| StorageError::SqliteError {
                message: format!("failed to commit: {e}"),
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}
