//! PII detection over sampled documents.

pub mod detector;
pub mod review;
pub mod rules;

pub use detector::{PiiDetector, MAX_VALUE_BYTES};
pub use review::InMemoryReviewQueue;
pub use rules::{PiiRule, PII_RULES};
