//! Provenance: the source coordinates attached to every fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1-based inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: u32,
    pub end: u32,
}

impl LineSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Build from 0-based tree-sitter rows.
    pub fn from_rows(start_row: usize, end_row: usize) -> Self {
        Self::new(start_row as u32 + 1, end_row as u32 + 1)
    }
}

/// Revision-level part of provenance, shared by every fact of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRevision {
    pub repository: String,
    pub commit_id: String,
    pub branch: Option<String>,
    pub tag: Option<String>,
    /// Working tree had no uncommitted changes at scan time.
    pub is_clean: bool,
    pub extracted_at: DateTime<Utc>,
    pub extractor_version: String,
}

impl SourceRevision {
    pub fn provenance(&self, file_path: &str, symbol: &str, line_span: LineSpan) -> ProvenanceRecord {
        ProvenanceRecord {
            repository: self.repository.clone(),
            file_path: file_path.to_string(),
            symbol: symbol.to_string(),
            line_span,
            commit_id: self.commit_id.clone(),
            extracted_at: self.extracted_at,
            extractor_version: self.extractor_version.clone(),
            branch: self.branch.clone(),
            tag: self.tag.clone(),
            is_clean: self.is_clean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub repository: String,
    /// Repository-relative path with `/` separators.
    pub file_path: String,
    pub symbol: String,
    pub line_span: LineSpan,
    pub commit_id: String,
    pub extracted_at: DateTime<Utc>,
    pub extractor_version: String,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub is_clean: bool,
}

impl ProvenanceRecord {
    /// Every invariant this record violates. Empty means valid.
    pub fn violations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.repository.trim().is_empty() {
            out.push("repository is empty");
        }
        if self.file_path.trim().is_empty() {
            out.push("file path is empty");
        }
        if self.symbol.trim().is_empty() {
            out.push("symbol is empty");
        }
        if self.line_span.start == 0 {
            out.push("line span starts at 0");
        }
        if self.line_span.end < self.line_span.start {
            out.push("line span ends before it starts");
        }
        if self.commit_id.trim().is_empty() {
            out.push("commit id is empty");
        }
        if self.extractor_version.trim().is_empty() {
            out.push("extractor version is empty");
        }
        out
    }

    pub fn is_valid(&self) -> bool {
        self.violations().is_empty()
    }

    /// Copy with the per-run fields cleared, for content hashing.
    pub(crate) fn without_revision(&self) -> Self {
        Self {
            commit_id: String::new(),
            extracted_at: DateTime::<Utc>::default(),
            branch: None,
            tag: None,
            is_clean: true,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision() -> SourceRevision {
        SourceRevision {
            repository: "shop".into(),
            commit_id: "abc123".into(),
            branch: Some("main".into()),
            tag: None,
            is_clean: true,
            extracted_at: Utc::now(),
            extractor_version: "docscope/test".into(),
        }
    }

    #[test]
    fn valid_record_has_no_violations() {
        let p = revision().provenance("src/Order.cs", "Shop.Order", LineSpan::new(3, 12));
        assert!(p.is_valid(), "{:?}", p.violations());
    }

    #[test]
    fn zero_start_and_empty_symbol_are_reported() {
        let mut p = revision().provenance("src/Order.cs", " ", LineSpan { start: 0, end: 0 });
        p.commit_id.clear();
        let v = p.violations();
        assert!(v.contains(&"symbol is empty"));
        assert!(v.contains(&"line span starts at 0"));
        assert!(v.contains(&"commit id is empty"));
    }

    #[test]
    fn line_span_never_inverts() {
        let span = LineSpan::new(10, 4);
        assert!(span.end >= span.start);
        assert_eq!(LineSpan::from_rows(0, 2), LineSpan::new(1, 3));
    }
}
