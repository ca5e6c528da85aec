//! Extended-JSON value classification and field flattening.

use docscope_core::model::BsonKind;
use serde_json::Value;

/// Classify one value. Extended-JSON wrappers (`{"$oid": ..}`,
/// `{"$date": ..}`, `{"$numberLong": ..}`) count as the type they wrap.
pub fn classify(value: &Value) -> BsonKind {
    match value {
        Value::Null => BsonKind::Null,
        Value::Bool(_) => BsonKind::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => BsonKind::Integer,
        Value::Number(_) => BsonKind::Number,
        Value::String(_) => BsonKind::String,
        Value::Array(_) => BsonKind::Array,
        Value::Object(_) => extended_kind(value).unwrap_or(BsonKind::Object),
    }
}

fn extended_kind(value: &Value) -> Option<BsonKind> {
    let Value::Object(map) = value else {
        return None;
    };
    let mut keys = map.keys();
    let key = keys.next()?;
    // Wrappers have exactly one key.
    if keys.next().is_some() {
        return None;
    }
    match key.as_str() {
        "$oid" => Some(BsonKind::Objectid),
        "$date" | "$timestamp" => Some(BsonKind::Datetime),
        "$numberLong" | "$numberInt" => Some(BsonKind::Integer),
        "$numberDouble" | "$numberDecimal" => Some(BsonKind::Number),
        "$uuid" | "$binary" | "$regularExpression" | "$symbol" => Some(BsonKind::String),
        _ => None,
    }
}

/// A plain sub-document (not an extended-JSON wrapper).
pub fn is_document(value: &Value) -> bool {
    value.is_object() && extended_kind(value).is_none()
}

/// Visit every (dot path, value) pair of a document. Nested documents and
/// documents inside arrays recurse with the parent path as prefix.
pub fn flatten<'v>(doc: &'v Value, max_depth: usize, visit: &mut dyn FnMut(&str, &'v Value)) {
    if let Value::Object(map) = doc {
        for (key, value) in map {
            walk(key, value, 1, max_depth, visit);
        }
    }
}

fn walk<'v>(path: &str, value: &'v Value, depth: usize, max_depth: usize, visit: &mut dyn FnMut(&str, &'v Value)) {
    visit(path, value);
    if depth >= max_depth {
        return;
    }
    match value {
        Value::Object(map) if is_document(value) => {
            for (key, child) in map {
                walk(&format!("{path}.{key}"), child, depth + 1, max_depth, visit);
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter(|i| is_document(i)) {
                if let Value::Object(map) = item {
                    for (key, child) in map {
                        walk(&format!("{path}.{key}"), child, depth + 1, max_depth, visit);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extended_json_wrappers() {
        assert_eq!(classify(&json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"})), BsonKind::Objectid);
        assert_eq!(classify(&json!({"$date": "2024-01-01T00:00:00Z"})), BsonKind::Datetime);
        assert_eq!(classify(&json!({"$numberLong": "42"})), BsonKind::Integer);
        assert_eq!(classify(&json!({"$numberDecimal": "1.5"})), BsonKind::Number);
        assert_eq!(classify(&json!({"street": "x"})), BsonKind::Object);
        assert_eq!(classify(&json!(1)), BsonKind::Integer);
        assert_eq!(classify(&json!(1.5)), BsonKind::Number);
    }

    #[test]
    fn flattens_nested_documents_and_arrays() {
        let doc = json!({
            "_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"},
            "shipTo": {"city": "Oslo"},
            "lines": [{"sku": "A", "qty": 1}, {"sku": "B"}, 3]
        });
        let mut paths = Vec::new();
        flatten(&doc, 16, &mut |p, _| paths.push(p.to_string()));
        paths.sort();
        paths.dedup();
        assert_eq!(
            paths,
            vec!["_id", "lines", "lines.qty", "lines.sku", "shipTo", "shipTo.city"]
        );
    }

    #[test]
    fn depth_limit_stops_recursion() {
        let doc = json!({"a": {"b": {"c": 1}}});
        let mut paths = Vec::new();
        flatten(&doc, 2, &mut |p, _| paths.push(p.to_string()));
        assert_eq!(paths, vec!["a", "a.b"]);
    }
}
