//! Manual-review queue boundary for PII detections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PiiError;
use crate::model::PiiDetection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: Uuid,
    pub collection: String,
    pub detection: PiiDetection,
    /// A few raw sample values for the reviewer.
    pub evidence: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl ReviewItem {
    pub fn new(collection: &str, detection: PiiDetection, evidence: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.to_string(),
            detection,
            evidence,
            enqueued_at: Utc::now(),
        }
    }
}

pub trait ReviewQueue: Send + Sync {
    fn enqueue(&self, item: ReviewItem) -> Result<(), PiiError>;
}
