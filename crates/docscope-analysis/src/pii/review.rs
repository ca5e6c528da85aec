//! In-memory manual-review queue.

use std::sync::Mutex;

use docscope_core::errors::PiiError;
use docscope_core::traits::{ReviewItem, ReviewQueue};

#[derive(Debug, Default)]
pub struct InMemoryReviewQueue {
    items: Mutex<Vec<ReviewItem>>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<ReviewItem> {
        self.items.lock().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|i| i.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReviewQueue for InMemoryReviewQueue {
    fn enqueue(&self, item: ReviewItem) -> Result<(), PiiError> {
        let mut items = self.items.lock().map_err(|_| PiiError::ReviewQueueFailed {
            field: item.detection.field_path.clone(),
            message: "review queue lock poisoned".to_string(),
        })?;
        items.push(item);
        Ok(())
    }
}
