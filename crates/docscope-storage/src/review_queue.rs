//! SQLite-backed [`ReviewQueue`] over the `pii_review_queue` table.

use std::sync::Arc;

use docscope_core::errors::{PiiError, StorageError};
use docscope_core::traits::{ReviewItem, ReviewQueue};
use uuid::Uuid;

use crate::connection::DatabaseManager;
use crate::queries::review::{self, ReviewStatus};

pub struct SqliteReviewQueue {
    db: Arc<DatabaseManager>,
}

impl SqliteReviewQueue {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    pub fn pending(&self) -> Result<Vec<ReviewItem>, StorageError> {
        self.db
            .with_reader(|conn| review::items_with_status(conn, ReviewStatus::Pending))
    }

    /// Close a pending item. Returns whether it existed.
    pub fn resolve(&self, id: &Uuid, confirmed: bool) -> Result<bool, StorageError> {
        let status = if confirmed {
            ReviewStatus::Confirmed
        } else {
            ReviewStatus::Dismissed
        };
        self.db.with_writer(|conn| review::set_status(conn, id, status))
    }
}

impl ReviewQueue for SqliteReviewQueue {
    fn enqueue(&self, item: ReviewItem) -> Result<(), PiiError> {
        self.db
            .with_writer(|conn| review::insert_item(conn, &item))
            .map_err(|e| PiiError::ReviewQueueFailed {
                field: item.detection.field_path.clone(),
                message: e.to_string(),
            })?;
        tracing::info!(
            collection = %item.collection,
            field = %item.detection.field_path,
            pii_type = %item.detection.pii_type,
            "queued PII detection for manual review"
        );
        Ok(())
    }
}
