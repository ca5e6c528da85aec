//! PII detection configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PiiConfig {
    /// Redact example values of detected fields. Default: true.
    pub redact: Option<bool>,
    /// Detections below this confidence are dropped. Default: 0.5.
    pub min_confidence: Option<f64>,
    /// Categories to skip entirely (e.g. "uuid").
    pub disabled_categories: Vec<String>,
}

impl PiiConfig {
    pub fn effective_redact(&self) -> bool {
        self.redact.unwrap_or(true)
    }

    pub fn effective_min_confidence(&self) -> f64 {
        self.min_confidence.unwrap_or(0.5)
    }

    pub fn is_category_enabled(&self, category: &str) -> bool {
        !self
            .disabled_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    pub(crate) fn merge_from(&mut self, other: &PiiConfig) {
        merge_fields!(self, other;
            opt: [redact, min_confidence];
            vec: [disabled_categories]);
    }
}
