//! repository_state and file_snapshots.

use docscope_core::errors::StorageError;
use docscope_core::traits::{FileSnapshot, RepositoryState};
use rusqlite::{params, Connection, OptionalExtension};

use super::{from_sql_time, to_sql_time};
use crate::sqlite_err;

pub fn get_repository_state(conn: &Connection, repository: &str) -> Result<Option<RepositoryState>, StorageError> {
    let row = conn
        .prepare_cached(
            "SELECT repository, last_commit, branch, scanned_at
             FROM repository_state WHERE repository = ?1",
        )
        .and_then(|mut stmt| {
            stmt.query_row(params![repository], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()
        })
        .map_err(sqlite_err)?;

    row.map(|(repository, last_commit, branch, scanned_at)| {
        Ok(RepositoryState {
            repository,
            last_commit,
            branch,
            scanned_at: from_sql_time(&scanned_at)?,
        })
    })
    .transpose()
}

pub fn save_repository_state(conn: &Connection, state: &RepositoryState) -> Result<(), StorageError> {
    conn.prepare_cached(
        "INSERT OR REPLACE INTO repository_state (repository, last_commit, branch, scanned_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            state.repository,
            state.last_commit,
            state.branch,
            to_sql_time(&state.scanned_at)
        ])
    })
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn file_snapshots(conn: &Connection, repository: &str) -> Result<Vec<FileSnapshot>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT repository, file_path, content_hash, payload
             FROM file_snapshots WHERE repository = ?1 ORDER BY file_path",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![repository], |row| {
            Ok(FileSnapshot {
                repository: row.get(0)?,
                file_path: row.get(1)?,
                content_hash: row.get(2)?,
                payload: row.get(3)?,
            })
        })
        .map_err(sqlite_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqlite_err)
}

pub fn upsert_file_snapshot(conn: &Connection, snapshot: &FileSnapshot) -> Result<(), StorageError> {
    conn.prepare_cached(
        "INSERT OR REPLACE INTO file_snapshots (repository, file_path, content_hash, payload)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            snapshot.repository,
            snapshot.file_path,
            snapshot.content_hash,
            snapshot.payload
        ])
    })
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn delete_file_snapshot(conn: &Connection, repository: &str, file_path: &str) -> Result<usize, StorageError> {
    conn.prepare_cached("DELETE FROM file_snapshots WHERE repository = ?1 AND file_path = ?2")
        .and_then(|mut stmt| stmt.execute(params![repository, file_path]))
        .map_err(sqlite_err)
}
