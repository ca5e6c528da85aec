//! String format detection.

use std::sync::LazyLock;

use regex::Regex;

/// (format, pattern). Checked in order; the first format every sample
/// matches is assigned.
const FORMATS: &[(&str, &str)] = &[
    ("email", r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"),
    (
        "uuid",
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    ),
    ("objectid", r"^[0-9a-fA-F]{24}$"),
    (
        "datetime",
        r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?$",
    ),
    ("date", r"^\d{4}-\d{2}-\d{2}$"),
    ("url", r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+[^\s]*$"),
    ("phone", r"^\+?[0-9][0-9 ().-]{6,18}[0-9]$"),
];

static COMPILED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FORMATS
        .iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).unwrap()))
        .collect()
});

/// Format shared by every sample, with its pattern. `None` for an empty
/// sample set or when no single format covers all values.
pub fn detect_format<S: AsRef<str>>(samples: &[S]) -> Option<(&'static str, &'static str)> {
    if samples.is_empty() {
        return None;
    }
    COMPILED
        .iter()
        .zip(FORMATS)
        .find(|((_, re), _)| samples.iter().all(|s| re.is_match(s.as_ref())))
        .map(|((name, _), (_, pattern))| (*name, *pattern))
}

/// Share of `samples` matching `format`. Zero for an unknown format or an
/// empty sample set.
pub fn match_ratio<S: AsRef<str>>(format: &str, samples: &[S]) -> f64 {
    let Some((_, re)) = COMPILED.iter().find(|(name, _)| *name == format) else {
        return 0.0;
    };
    if samples.is_empty() {
        return 0.0;
    }
    let matches = samples.iter().filter(|s| re.is_match(s.as_ref())).count();
    matches as f64 / samples.len() as f64
}

/// Confidence grows with the sample count: `frequency * n / (n + 1)`.
pub fn format_confidence(frequency: f64, samples: usize) -> f64 {
    let n = samples as f64;
    (frequency * n / (n + 1.0)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_ratio_counts_string_samples_only() {
        assert!((match_ratio("email", &["a@x.io", "b@y.org"]) - 1.0).abs() < 1e-9);
        assert!((match_ratio("email", &["a@x.io", "nope"]) - 0.5).abs() < 1e-9);
        assert_eq!(match_ratio("email", &[] as &[&str]), 0.0);
        assert_eq!(match_ratio("zipcode", &["12345"]), 0.0);
    }

    #[test]
    fn detects_formats_only_when_all_match() {
        assert_eq!(detect_format(&["a@x.io", "b@y.org"]).map(|f| f.0), Some("email"));
        assert_eq!(detect_format(&["a@x.io", "nope"]), None);
        assert_eq!(detect_format(&["2024-01-31"]).map(|f| f.0), Some("date"));
        assert_eq!(
            detect_format(&["2024-01-31T10:00:00Z", "2024-02-01T08:30:00.123+01:00"]).map(|f| f.0),
            Some("datetime")
        );
        assert_eq!(detect_format(&["65a1f0c2e4b0a1b2c3d4e5f6"]).map(|f| f.0), Some("objectid"));
        assert_eq!(detect_format(&["https://example.com/a?b=1"]).map(|f| f.0), Some("url"));
        assert_eq!(detect_format(&["+47 22 33 44 55"]).map(|f| f.0), Some("phone"));
        assert_eq!(detect_format::<&str>(&[]), None);
    }

    #[test]
    fn confidence_grows_with_samples() {
        assert!((format_confidence(1.0, 1) - 0.5).abs() < 1e-9);
        assert!(format_confidence(1.0, 99) > 0.98);
        assert!(format_confidence(0.5, 10) < 0.5);
    }
}
