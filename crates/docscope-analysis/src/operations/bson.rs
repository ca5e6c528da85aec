//! BSON document literals as JSON values.
//!
//! `new BsonDocument("status", "A")`, `new BsonDocument { { "$gt", 10 } }`,
//! anonymous objects and `BsonDocument.Parse("{ status: 'A' }")` all become a
//! `serde_json::Value`, so filters, stages and updates written as documents
//! share one reader. Values that are not literals keep their rendered source
//! text as a JSON string.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::syntax::Expr;

const MAX_DOCUMENT_DEPTH: usize = 32;

static UNQUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_$][\w$.]*)\s*:"#).unwrap());

/// Locals visible to the call, latest declaration last.
pub type Locals<'a> = &'a [(String, Expr)];

pub fn local<'a>(locals: Locals<'a>, name: &str) -> Option<&'a Expr> {
    locals.iter().rev().find(|(n, _)| n == name).map(|(_, e)| e)
}

/// Parse the relaxed JSON developers write in C# strings: unquoted keys and
/// single-quoted strings.
pub fn parse_lenient_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let quoted = text.replace('\'', "\"");
    let keyed = UNQUOTED_KEY.replace_all(&quoted, "$1\"$2\":");
    serde_json::from_str(&keyed).ok()
}

/// Convert a document-shaped expression. `None` when `expr` is not one.
pub fn document_value(expr: &Expr, locals: Locals) -> Option<Value> {
    to_document(expr, locals, 0)
}

fn is_document_type(type_name: &str) -> bool {
    let base = type_name.trim_end_matches("[]");
    matches!(
        base.rsplit('.').next().unwrap_or(base),
        "BsonDocument" | "BsonArray" | "BsonElement" | "Dictionary<string, object>"
    ) || base.starts_with("List<BsonDocument")
}

fn to_document(expr: &Expr, locals: Locals, depth: usize) -> Option<Value> {
    if depth > MAX_DOCUMENT_DEPTH {
        return None;
    }
    let d = depth + 1;
    match expr {
        Expr::Identifier(name) => local(locals, name).and_then(|e| to_document(e, locals, d)),
        Expr::ObjectCreation {
            type_name,
            args,
            initializer,
        } if is_document_type(type_name) => {
            if type_name.ends_with("[]") || type_name.starts_with("BsonArray") || type_name.starts_with("List<") {
                let items = args
                    .iter()
                    .map(|a| &a.value)
                    .chain(initializer.iter())
                    .map(|e| to_value(e, locals, d))
                    .collect();
                return Some(Value::Array(items));
            }
            let mut map = Map::new();
            match args.as_slice() {
                [key, value] => {
                    if let Some(key) = key.value.as_str_literal() {
                        map.insert(key.to_string(), to_value(&value.value, locals, d));
                    }
                }
                [single] => {
                    if let Some(Value::Object(inner)) = to_document(&single.value, locals, d) {
                        map.extend(inner);
                    }
                }
                _ => {}
            }
            for item in initializer {
                insert_pair(&mut map, item, locals, d);
            }
            Some(Value::Object(map))
        }
        Expr::AnonymousObject(members) => {
            let map = members
                .iter()
                .filter_map(|m| {
                    let name = m.effective_name()?;
                    Some((name.to_string(), to_value(&m.value, locals, d)))
                })
                .collect();
            Some(Value::Object(map))
        }
        Expr::Collection(items) => Some(Value::Array(
            items.iter().map(|e| to_value(e, locals, d)).collect(),
        )),
        Expr::Invocation { callee, args, .. } => {
            match callee.last_name() {
                Some("Parse") => args
                    .first()
                    .and_then(|a| string_value(&a.value, locals))
                    .and_then(|s| parse_lenient_json(&s)),
                // `new BsonDocument().Add("k", v)`
                Some("Add") => {
                    let mut base = callee.receiver().and_then(|r| to_document(r, locals, d))?;
                    if let (Value::Object(map), [key, value]) = (&mut base, args.as_slice()) {
                        if let Some(key) = key.value.as_str_literal() {
                            map.insert(key.to_string(), to_value(&value.value, locals, d));
                        }
                    }
                    Some(base)
                }
                _ => None,
            }
        }
        Expr::StringLiteral(s) if s.trim_start().starts_with(['{', '[']) => parse_lenient_json(s),
        _ => None,
    }
}

/// `{ "key", value }` or `["key"] = value` initializer entries.
fn insert_pair(map: &mut Map<String, Value>, item: &Expr, locals: Locals, depth: usize) {
    match item {
        Expr::Collection(pair) => {
            if let [key, value] = pair.as_slice() {
                if let Some(key) = key.as_str_literal() {
                    map.insert(key.to_string(), to_value(value, locals, depth));
                }
            }
        }
        Expr::Assignment { target, value } => {
            let key = match target.as_ref() {
                Expr::ElementAccess { index, .. } => index.as_str_literal().map(str::to_string),
                Expr::Collection(keys) => keys.first().and_then(Expr::as_str_literal).map(str::to_string),
                other => other.last_name().map(str::to_string),
            };
            if let Some(key) = key {
                map.insert(key, to_value(value, locals, depth));
            }
        }
        _ => {}
    }
}

/// Any expression as a JSON value: documents recurse, literals convert, the
/// rest keeps its source text.
fn to_value(expr: &Expr, locals: Locals, depth: usize) -> Value {
    if let Some(doc) = to_document(expr, locals, depth) {
        return doc;
    }
    match expr {
        Expr::StringLiteral(s) => Value::String(s.clone()),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Null => Value::Null,
        Expr::Number(_) | Expr::Unary { .. } => match expr.as_i64() {
            Some(n) => Value::Number(Number::from(n)),
            None => expr
                .render()
                .trim_end_matches(['d', 'D', 'f', 'F', 'm', 'M'])
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(expr.render())),
        },
        other => Value::String(other.render()),
    }
}

/// String literal, directly or through a local.
pub fn string_value(expr: &Expr, locals: Locals) -> Option<String> {
    match expr {
        Expr::StringLiteral(s) => Some(s.clone()),
        Expr::Identifier(name) => local(locals, name).and_then(|e| string_value(e, locals)),
        _ => None,
    }
}

/// Render a JSON value the way it would be written in a query.
pub fn render_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
