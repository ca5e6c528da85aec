//! Rule evaluation and redaction over an observed schema.

use std::collections::BTreeMap;

use docscope_core::config::PiiConfig;
use docscope_core::errors::PiiError;
use docscope_core::model::{DetectionMethod, ObservedSchema, PiiDetection};
use docscope_core::traits::{ReviewItem, ReviewQueue};

use super::rules::{normalize_field_name, PiiRule, PII_RULES, VALUE_PATTERNS};

/// Values larger than this are not pattern-matched; the field fails.
pub const MAX_VALUE_BYTES: usize = 64 * 1024;
/// Raw samples handed to a reviewer.
const REVIEW_EVIDENCE: usize = 3;

/// Evaluate one rule against a field. Field-name matches win outright;
/// otherwise confidence scales with the share of matching samples.
pub fn evaluate(
    rule: &PiiRule,
    pattern: Option<&regex::Regex>,
    field_path: &str,
    samples: &[String],
) -> Option<PiiDetection> {
    let leaf = field_path.rsplit('.').next().unwrap_or(field_path);
    if let Some(keyword) = rule.matches_field_name(&normalize_field_name(leaf)) {
        return Some(detection(rule, field_path, DetectionMethod::FieldName, keyword, rule.base_confidence, samples.len(), 0));
    }
    let pattern = pattern?;
    if samples.is_empty() {
        return None;
    }
    let matches = samples
        .iter()
        .filter(|s| pattern.is_match(s) && rule.validator.map_or(true, |check| check(s)))
        .count();
    if matches == 0 {
        return None;
    }
    let confidence = (rule.base_confidence * matches as f64 / samples.len() as f64).min(1.0);
    Some(detection(
        rule,
        field_path,
        DetectionMethod::ValuePattern,
        pattern.as_str(),
        confidence,
        samples.len(),
        matches,
    ))
}

fn detection(
    rule: &PiiRule,
    field_path: &str,
    method: DetectionMethod,
    matched: &str,
    confidence: f64,
    sample_count: usize,
    match_count: usize,
) -> PiiDetection {
    PiiDetection {
        field_path: field_path.to_string(),
        pii_type: rule.category,
        confidence,
        method,
        matched_pattern: matched.to_string(),
        sample_count,
        match_count,
        is_redacted: false,
        requires_manual_review: rule.requires_review,
        queued_for_review: false,
    }
}

pub struct PiiDetector {
    config: PiiConfig,
}

impl PiiDetector {
    pub fn new(config: &PiiConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Best detection for a field, if any. A field-name match short-circuits
    /// the table; value matches keep the most confident rule.
    pub fn detect_field(&self, field_path: &str, samples: &[String]) -> Result<Option<PiiDetection>, PiiError> {
        if let Some(big) = samples.iter().find(|s| s.len() > MAX_VALUE_BYTES) {
            return Err(PiiError::RuleFailed {
                rule: "value_size".to_string(),
                field: field_path.to_string(),
                message: format!("sample of {} bytes exceeds {MAX_VALUE_BYTES}", big.len()),
            });
        }
        let mut best: Option<PiiDetection> = None;
        for (rule, pattern) in PII_RULES.iter().zip(VALUE_PATTERNS.iter()) {
            if !self.config.is_category_enabled(rule.category.name()) {
                continue;
            }
            let Some(found) = evaluate(rule, pattern.as_ref(), field_path, samples) else {
                continue;
            };
            if found.method == DetectionMethod::FieldName {
                return Ok(Some(found));
            }
            if best.as_ref().map_or(true, |b| found.confidence > b.confidence) {
                best = Some(found);
            }
        }
        Ok(best.filter(|d| d.confidence >= self.config.effective_min_confidence()))
    }

    /// Detect over every sampled field of `schema`, then redact or withhold
    /// examples. Review-flagged detections go to `queue`. Field failures are
    /// returned and do not stop the other fields.
    pub fn apply(
        &self,
        schema: &mut ObservedSchema,
        strings: &BTreeMap<String, Vec<String>>,
        queue: &dyn ReviewQueue,
    ) -> Vec<PiiError> {
        let mut errors = Vec::new();
        let mut detections = Vec::new();
        let empty = Vec::new();

        for (path, stats) in schema.field_types.iter_mut() {
            let samples = strings.get(path).unwrap_or(&empty);
            let mut found = match self.detect_field(path, samples) {
                Ok(Some(d)) => d,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(collection = %schema.collection_name, field = %path, error = %e, "PII detection failed, field skipped");
                    errors.push(e);
                    continue;
                }
            };
            if found.requires_manual_review {
                let evidence = samples.iter().take(REVIEW_EVIDENCE).cloned().collect();
                match queue.enqueue(ReviewItem::new(&schema.collection_name, found.clone(), evidence)) {
                    Ok(()) => found.queued_for_review = true,
                    Err(e) => {
                        tracing::warn!(collection = %schema.collection_name, field = %path, error = %e, "review queue rejected detection");
                        errors.push(e);
                    }
                }
                stats.examples.clear();
            } else if self.config.effective_redact() {
                let marker = serde_json::Value::String(format!("[REDACTED:{}]", found.pii_type));
                for example in stats.examples.iter_mut() {
                    *example = marker.clone();
                }
                found.is_redacted = true;
            }
            detections.push(found);
        }

        schema
            .enum_candidates
            .retain(|e| !detections.iter().any(|d| d.field_path == e.field_path));
        schema.pii_redacted = detections
            .iter()
            .any(|d| d.is_redacted || d.requires_manual_review);
        if !detections.is_empty() {
            tracing::debug!(
                collection = %schema.collection_name,
                detections = detections.len(),
                "PII detected"
            );
        }
        schema.pii_detections = detections;
        errors
    }
}
