//! Evidence rules and the confidence formula.

use docscope_core::model::{EvidenceType, RelationshipEvidence};

/// Base confidence each rule assigns to its evidence.
pub const FILTER_CONFIDENCE: f64 = 0.75;
pub const NAMING_CONFIDENCE: f64 = 0.5;
pub const ATTRIBUTE_CONFIDENCE: f64 = 0.6;
pub const LOOKUP_CONFIDENCE: f64 = 0.9;
pub const EMBEDDED_CONFIDENCE: f64 = 0.85;
pub const INHERITANCE_CONFIDENCE: f64 = 0.95;

/// Reliability weight of an evidence kind in the aggregate confidence.
const EVIDENCE_WEIGHTS: &[(EvidenceType, f64)] = &[
    (EvidenceType::Lookup, 1.0),
    (EvidenceType::Inheritance, 1.0),
    (EvidenceType::Filter, 0.9),
    (EvidenceType::Embedded, 0.8),
    (EvidenceType::Attribute, 0.6),
    (EvidenceType::NamingConvention, 0.4),
];

pub fn weight(evidence: EvidenceType) -> f64 {
    EVIDENCE_WEIGHTS
        .iter()
        .find(|(t, _)| *t == evidence)
        .map_or(0.0, |(_, w)| *w)
}

/// Reliability-weighted mean of the evidence confidences, clamped to [0, 1].
pub fn aggregate_confidence<'a>(evidence: impl IntoIterator<Item = &'a RelationshipEvidence>) -> f64 {
    let (weighted, total) = evidence.into_iter().fold((0.0, 0.0), |(sum, w), e| {
        let wt = weight(e.evidence_type);
        (sum + wt * e.confidence.clamp(0.0, 1.0), w + wt)
    });
    if total <= 0.0 {
        return 0.0;
    }
    (weighted / total).clamp(0.0, 1.0)
}

/// Type name a reference member points at: `CustomerId` / `customer_id` ->
/// `Customer`, `TagIds` -> `Tag` (plural).
pub fn reference_stem(name: &str) -> Option<(&str, bool)> {
    let lower = name.to_ascii_lowercase();
    let (stem_len, plural) = if lower.ends_with("_ids") {
        (name.len() - 4, true)
    } else if lower.ends_with("_id") {
        (name.len() - 3, false)
    } else if name.ends_with("Ids") {
        (name.len() - 3, true)
    } else if name.ends_with("Id") || name.ends_with("ID") {
        (name.len() - 2, false)
    } else {
        return None;
    };
    let stem = name[..stem_len].trim_end_matches('_');
    // `_id`, `Id` and friends are the document's own key.
    (!stem.is_empty()).then_some((stem, plural))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(evidence_type: EvidenceType, confidence: f64) -> RelationshipEvidence {
        RelationshipEvidence {
            evidence_type,
            description: String::new(),
            confidence,
            location: None,
        }
    }

    #[test]
    fn weighted_mean_of_mixed_evidence() {
        let evidence = [
            ev(EvidenceType::Filter, FILTER_CONFIDENCE),
            ev(EvidenceType::NamingConvention, NAMING_CONFIDENCE),
        ];
        let expected = (0.9 * 0.75 + 0.4 * 0.5) / (0.9 + 0.4);
        assert!((aggregate_confidence(&evidence) - expected).abs() < 1e-9);
    }

    #[test]
    fn single_evidence_keeps_its_confidence() {
        let evidence = [ev(EvidenceType::Lookup, LOOKUP_CONFIDENCE)];
        assert!((aggregate_confidence(&evidence) - 0.9).abs() < 1e-9);
        assert_eq!(aggregate_confidence(&Vec::<RelationshipEvidence>::new()), 0.0);
    }

    #[test]
    fn reference_stems() {
        assert_eq!(reference_stem("CustomerId"), Some(("Customer", false)));
        assert_eq!(reference_stem("customer_id"), Some(("customer", false)));
        assert_eq!(reference_stem("TagIds"), Some(("Tag", true)));
        assert_eq!(reference_stem("Id"), None);
        assert_eq!(reference_stem("_id"), None);
        assert_eq!(reference_stem("Name"), None);
    }

    proptest::proptest! {
        #[test]
        fn aggregate_stays_in_unit_interval(confidences in proptest::collection::vec(-1.0f64..2.0, 0..8)) {
            let kinds = [
                EvidenceType::Filter,
                EvidenceType::Lookup,
                EvidenceType::Embedded,
                EvidenceType::NamingConvention,
                EvidenceType::Inheritance,
                EvidenceType::Attribute,
            ];
            let evidence: Vec<_> = confidences
                .iter()
                .enumerate()
                .map(|(i, c)| ev(kinds[i % kinds.len()], *c))
                .collect();
            let c = aggregate_confidence(&evidence);
            proptest::prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
