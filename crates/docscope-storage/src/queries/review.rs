//! pii_review_queue.

use docscope_core::errors::StorageError;
use docscope_core::model::PiiDetection;
use docscope_core::traits::ReviewItem;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{from_json, from_sql_time, to_json, to_sql_time};
use crate::sqlite_err;

/// Reviewer decision on a queued detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Pending,
    Confirmed,
    Dismissed,
}

impl ReviewStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Dismissed => "dismissed",
        }
    }
}

pub fn insert_item(conn: &Connection, item: &ReviewItem) -> Result<(), StorageError> {
    let detection = to_json("pii_review_queue", &item.detection)?;
    let evidence = to_json("pii_review_queue", &item.evidence)?;
    conn.prepare_cached(
        "INSERT OR IGNORE INTO pii_review_queue
            (id, collection, field_path, pii_type, confidence, detection, evidence, enqueued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            item.id.to_string(),
            item.collection,
            item.detection.field_path,
            item.detection.pii_type.name(),
            item.detection.confidence,
            detection,
            evidence,
            to_sql_time(&item.enqueued_at),
        ])
    })
    .map_err(sqlite_err)?;
    Ok(())
}

/// Items in `status`, oldest first.
pub fn items_with_status(conn: &Connection, status: ReviewStatus) -> Result<Vec<ReviewItem>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, collection, detection, evidence, enqueued_at
             FROM pii_review_queue WHERE status = ?1
             ORDER BY enqueued_at, id",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![status.name()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .map_err(sqlite_err)?;

    let mut items = Vec::new();
    for row in rows {
        let (id, collection, detection, evidence, enqueued_at) = row.map_err(sqlite_err)?;
        items.push(ReviewItem {
            id: Uuid::parse_str(&id).map_err(|e| StorageError::Serialization {
                entity: "pii_review_queue".to_string(),
                message: e.to_string(),
            })?,
            collection,
            detection: from_json::<PiiDetection>("pii_review_queue", &detection)?,
            evidence: from_json("pii_review_queue", &evidence)?,
            enqueued_at: from_sql_time(&enqueued_at)?,
        });
    }
    Ok(items)
}

/// Record a reviewer decision. Returns whether the item existed.
pub fn set_status(conn: &Connection, id: &Uuid, status: ReviewStatus) -> Result<bool, StorageError> {
    conn.prepare_cached("UPDATE pii_review_queue SET status = ?2 WHERE id = ?1")
        .and_then(|mut stmt| stmt.execute(params![id.to_string(), status.name()]))
        .map(|changed| changed > 0)
        .map_err(sqlite_err)
}
