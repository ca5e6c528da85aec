//! Per-collection accumulation of sampled documents into schema facts.

use std::collections::BTreeMap;

use docscope_core::config::SamplingConfig;
use docscope_core::model::{BsonKind, EnumCandidate, FieldTypeStats, StringFormat};
use docscope_core::types::{FxHashMap, FxHashSet};
use serde_json::{json, Map, Value};

use super::formats::{detect_format, format_confidence, match_ratio};
use super::kinds::{classify, flatten};

#[derive(Debug, Default)]
struct FieldAccumulator {
    /// Documents containing the path at least once.
    occurrences: u64,
    kinds: BTreeMap<BsonKind, u64>,
    examples: Vec<Value>,
    strings: Vec<String>,
    /// Non-null scalar values seen, the enum denominator.
    scalars: u64,
    /// Canonical JSON rendering -> (display label, count).
    distinct: FxHashMap<String, (String, u64)>,
    /// Distinct values exceeded the enum ceiling; stop counting.
    distinct_overflow: bool,
}

impl FieldAccumulator {
    fn total(&self) -> u64 {
        self.kinds.values().sum()
    }
}

/// What one collection's sample reduces to, before ids and PII are applied.
#[derive(Debug)]
pub struct SampledShape {
    pub documents: u64,
    pub field_types: BTreeMap<String, FieldTypeStats>,
    pub required_fields: Vec<String>,
    pub string_formats: Vec<StringFormat>,
    pub enum_candidates: Vec<EnumCandidate>,
    pub json_schema: Value,
    /// Every string value seen per path, for PII detection.
    pub strings: BTreeMap<String, Vec<String>>,
}

pub struct SchemaAccumulator {
    documents: u64,
    fields: BTreeMap<String, FieldAccumulator>,
    max_examples: usize,
    max_depth: usize,
    enum_min: usize,
    enum_max: usize,
    enum_good_max: usize,
}

impl SchemaAccumulator {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            documents: 0,
            fields: BTreeMap::new(),
            max_examples: config.effective_max_examples(),
            max_depth: config.effective_max_depth(),
            enum_min: config.effective_enum_min_distinct(),
            enum_max: config.effective_enum_max_distinct(),
            enum_good_max: config.effective_enum_good_candidate_max(),
        }
    }

    pub fn documents(&self) -> u64 {
        self.documents
    }

    pub fn add(&mut self, doc: &Value) {
        self.documents += 1;
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let (fields, max_examples, enum_max) = (&mut self.fields, self.max_examples, self.enum_max);
        flatten(doc, self.max_depth, &mut |path, value| {
            let field = fields.entry(path.to_string()).or_default();
            if seen.insert(path.to_string()) {
                field.occurrences += 1;
            }
            *field.kinds.entry(classify(value)).or_default() += 1;
            let scalar = !value.is_array() && classify(value) != BsonKind::Object;
            if scalar && field.examples.len() < max_examples && !field.examples.contains(value) {
                field.examples.push(value.clone());
            }
            if let Value::String(s) = value {
                field.strings.push(s.clone());
            }
            if scalar && !value.is_null() {
                field.scalars += 1;
                if !field.distinct_overflow {
                    field
                        .distinct
                        .entry(value.to_string())
                        .or_insert_with(|| (enum_label(value), 0))
                        .1 += 1;
                    if field.distinct.len() > enum_max {
                        field.distinct_overflow = true;
                        field.distinct.clear();
                    }
                }
            }
        });
    }

    pub fn finish(self) -> SampledShape {
        let n = self.documents;
        let mut field_types = BTreeMap::new();
        let mut required_fields = Vec::new();
        let mut string_formats = Vec::new();
        let mut enum_candidates = Vec::new();
        let mut strings = BTreeMap::new();

        for (path, acc) in self.fields {
            let total = acc.total();
            if acc.occurrences == n {
                required_fields.push(path.clone());
            }
            if let Some((format, pattern)) = detect_format(&acc.strings) {
                let frequency = match_ratio(format, &acc.strings);
                string_formats.push(StringFormat {
                    field_path: path.clone(),
                    format: format.to_string(),
                    pattern: pattern.to_string(),
                    frequency,
                    confidence: format_confidence(frequency, acc.strings.len()),
                });
            }
            if let Some(candidate) = enum_candidate(&path, &acc, self.enum_min, self.enum_max, self.enum_good_max) {
                enum_candidates.push(candidate);
            }
            let frequencies: BTreeMap<BsonKind, f64> = acc
                .kinds
                .iter()
                .map(|(k, c)| (*k, *c as f64 / total.max(1) as f64))
                .collect();
            // Mode; ties go to the first kind in declaration order.
            let primary_type = acc
                .kinds
                .iter()
                .fold(None::<(BsonKind, u64)>, |best, (k, c)| match best {
                    Some((_, bc)) if bc >= *c => best,
                    _ => Some((*k, *c)),
                })
                .map_or(BsonKind::Null, |(k, _)| k);
            field_types.insert(
                path.clone(),
                FieldTypeStats {
                    occurrences: acc.occurrences,
                    frequencies,
                    primary_type,
                    examples: acc.examples,
                },
            );
            if !acc.strings.is_empty() {
                strings.insert(path, acc.strings);
            }
        }

        let json_schema = object_schema("", n, &field_types);
        SampledShape {
            documents: n,
            field_types,
            required_fields,
            string_formats,
            enum_candidates,
            json_schema,
            strings,
        }
    }
}

fn enum_candidate(path: &str, acc: &FieldAccumulator, min: usize, max: usize, good_max: usize) -> Option<EnumCandidate> {
    if acc.distinct_overflow || acc.scalars == 0 {
        return None;
    }
    let distinct = acc.distinct.len();
    if distinct < min || distinct > max {
        return None;
    }
    let total = acc.scalars;
    let mut counted: Vec<(&String, u64)> = acc.distinct.values().map(|(label, c)| (label, *c)).collect();
    counted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    Some(EnumCandidate {
        field_path: path.to_string(),
        values: counted.iter().map(|(v, _)| (*v).clone()).collect(),
        frequencies: counted.iter().map(|(_, c)| *c as f64 / total as f64).collect(),
        confidence: (1.0 - distinct as f64 / total as f64).max(0.1),
        distinct_count: distinct,
        total_count: total,
        is_good_candidate: distinct <= good_max,
    })
}

/// Strings as themselves, every other scalar as its JSON text.
fn enum_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn leaf_schema(stats: &FieldTypeStats) -> Value {
    let kinds: Vec<&str> = stats.frequencies.keys().map(BsonKind::bson_type).collect();
    match kinds.as_slice() {
        [single] => json!({ "bsonType": single }),
        many => json!({ "bsonType": many }),
    }
}

/// Nested JSON-Schema-like document for the fields under `prefix`.
fn object_schema(prefix: &str, parent_occurrences: u64, fields: &BTreeMap<String, FieldTypeStats>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    let children = fields.iter().filter(|(path, _)| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('.'))
    });
    for (path, stats) in children {
        let name = &path[prefix.len()..];
        let mut node = leaf_schema(stats);
        let child_prefix = format!("{path}.");
        let has_children = fields.keys().any(|p| p.starts_with(&child_prefix));
        if has_children {
            let nested = object_schema(&child_prefix, stats.occurrences, fields);
            if let Value::Object(map) = &mut node {
                if stats.frequencies.contains_key(&BsonKind::Array) {
                    map.insert("items".to_string(), nested);
                } else if let Value::Object(inner) = nested {
                    for (k, v) in inner {
                        if k != "bsonType" {
                            map.insert(k, v);
                        }
                    }
                }
            }
        }
        if stats.occurrences >= parent_occurrences && parent_occurrences > 0 {
            required.push(Value::String(name.to_string()));
        }
        properties.insert(name.to_string(), node);
    }
    json!({
        "bsonType": "object",
        "properties": properties,
        "required": required,
    })
}
