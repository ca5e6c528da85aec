//! Aggregation pipelines: fluent `Aggregate()` chains, stage documents,
//! `PipelineDefinition` literals and `BsonDocument.Parse` strings.

use docscope_core::model::{FieldExpression, LookupSpec, PipelineStage};
use serde_json::Value;

use super::bson::{document_value, render_json, Locals};
use super::filters::{extract_filters, field_path, json_filters};
use super::shapes::{builder_calls, extract_projections, extract_sorts};
use crate::source::ChainCall;
use crate::syntax::{Argument, Expr};

/// Resolves a collection-handle expression (`_customers`) to its collection name.
pub type CollectionLookup<'a> = &'a dyn Fn(&Expr) -> Option<String>;

pub struct PipelineReader<'a> {
    locals: Locals<'a>,
    collections: CollectionLookup<'a>,
}

impl<'a> PipelineReader<'a> {
    pub fn new(locals: Locals<'a>, collections: CollectionLookup<'a>) -> Self {
        Self {
            locals,
            collections,
        }
    }

    /// Stages of a fluent chain after `Aggregate()`. Non-stage calls
    /// (`ToListAsync`, `FirstOrDefault`) are skipped.
    pub fn fluent_stages(&self, chain: &[ChainCall]) -> Vec<PipelineStage> {
        let mut stages: Vec<PipelineStage> = Vec::new();
        for call in chain {
            self.push_fluent(&mut stages, &call.method, &call.args);
        }
        stages
    }

    fn push_fluent(&self, stages: &mut Vec<PipelineStage>, method: &str, args: &[Argument]) {
        let first = args.first().map(|a| &a.value);
        let stage = match method {
            "Match" => {
                let mut s = PipelineStage::new("$match");
                if let Some(f) = first {
                    s.fields = extract_filters(f, self.locals);
                }
                s
            }
            "Lookup" => self.fluent_lookup(args),
            "GraphLookup" => self.fluent_graph_lookup(args),
            "Group" => {
                let mut s = PipelineStage::new("$group");
                s.fields = args
                    .iter()
                    .flat_map(|a| group_fields(&a.value, self.locals))
                    .collect();
                s
            }
            "Unwind" => {
                let mut s = PipelineStage::new("$unwind");
                if let Some(path) = first.and_then(field_path) {
                    s.fields.push(FieldExpression::new(path.trim_start_matches('$'), "unwind", None));
                }
                s
            }
            "Project" => {
                let mut s = PipelineStage::new("$project");
                if let Some(p) = first {
                    s.fields = extract_projections(p, self.locals);
                }
                s
            }
            "Sort" | "SortBy" | "SortByDescending" | "ThenBy" | "ThenByDescending" => {
                let fields = match (method, first) {
                    ("Sort", Some(def)) => extract_sorts(def, self.locals),
                    (_, Some(key)) => field_path(key)
                        .map(|path| {
                            let dir = if method.ends_with("Descending") { "desc" } else { "asc" };
                            vec![FieldExpression::new(path, dir, None)]
                        })
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                // `SortBy(..).ThenBy(..)` is one `$sort` stage.
                if method.starts_with("ThenBy") {
                    if let Some(last) = stages.last_mut().filter(|s| s.operator == "$sort") {
                        last.fields.extend(fields);
                        return;
                    }
                }
                let mut s = PipelineStage::new("$sort");
                s.fields = fields;
                s
            }
            "Limit" | "Skip" | "Sample" => {
                let mut s = PipelineStage::new(format!("${}", method.to_ascii_lowercase()));
                if let Some(n) = first {
                    s.fields.push(FieldExpression::new("", "value", Some(n.render())));
                }
                s
            }
            "Count" => PipelineStage::new("$count"),
            "SortByCount" => {
                let mut s = PipelineStage::new("$sortByCount");
                if let Some(path) = first.and_then(field_path) {
                    s.fields.push(FieldExpression::new(path, "group", None));
                }
                s
            }
            "ReplaceRoot" | "ReplaceWith" => {
                let mut s = PipelineStage::new("$replaceRoot");
                if let Some(path) = first.and_then(field_path) {
                    s.fields.push(FieldExpression::new(path, "newRoot", None));
                }
                s
            }
            "Facet" => PipelineStage::new("$facet"),
            "Bucket" | "BucketAuto" => PipelineStage::new(format!("${}", lower_first(method))),
            "Out" | "Merge" => {
                let mut s = PipelineStage::new(format!("${}", method.to_ascii_lowercase()));
                if let Some(target) = first {
                    let name = target
                        .as_str_literal()
                        .map(str::to_string)
                        .or_else(|| (self.collections)(target))
                        .unwrap_or_else(|| target.render());
                    s.fields.push(FieldExpression::new("", "into", Some(name)));
                }
                s
            }
            "AppendStage" => {
                match first.and_then(|f| document_value(f, self.locals)).and_then(|v| stage_from_json(&v)) {
                    Some(s) => s,
                    None => return,
                }
            }
            _ => return,
        };
        stages.push(stage);
    }

    /// `Lookup("from", "local", "foreign", "as")` or
    /// `Lookup(foreignHandle, x => x.Local, f => f.Foreign, r => r.As)`.
    fn fluent_lookup(&self, args: &[Argument]) -> PipelineStage {
        let mut stage = PipelineStage::new("$lookup");
        let named = |name: &str| args.iter().find(|a| a.name.as_deref() == Some(name)).map(|a| &a.value);
        let positional: Vec<&Expr> = args.iter().filter(|a| a.name.is_none()).map(|a| &a.value).collect();
        let from = named("foreignCollection")
            .or_else(|| named("foreignCollectionName"))
            .or_else(|| positional.first().copied());
        let Some(from) = from else {
            return stage;
        };
        let from = from
            .as_str_literal()
            .map(str::to_string)
            .or_else(|| (self.collections)(from));
        let field = |name: &str, index: usize| {
            named(name)
                .or_else(|| positional.get(index).copied())
                .and_then(field_path)
        };
        if let Some(from) = from {
            stage.lookup = Some(LookupSpec {
                from,
                local_field: field("localField", 1),
                foreign_field: field("foreignField", 2),
                as_field: field("as", 3),
            });
        }
        stage
    }

    /// `GraphLookup(from, connectFromField, connectToField, startWith, as)`.
    fn fluent_graph_lookup(&self, args: &[Argument]) -> PipelineStage {
        let mut stage = PipelineStage::new("$graphLookup");
        let Some(from) = args.first().map(|a| &a.value) else {
            return stage;
        };
        let from = from
            .as_str_literal()
            .map(str::to_string)
            .or_else(|| (self.collections)(from));
        let field = |i: usize| args.get(i).and_then(|a| field_path(&a.value));
        if let Some(from) = from {
            stage.lookup = Some(LookupSpec {
                from,
                local_field: field(1),
                foreign_field: field(2),
                as_field: field(4),
            });
        }
        stage
    }

    /// Stages of a pipeline argument: `new[] { stage, .. }`,
    /// `new BsonDocument[] { .. }`, `PipelineDefinition<T, U>.Create(..)`,
    /// a fluent `EmptyPipelineDefinition`, or a local holding one of those.
    pub fn argument_stages(&self, expr: &Expr) -> Option<Vec<PipelineStage>> {
        if let Some(doc) = document_value(expr, self.locals) {
            let stages = match &doc {
                Value::Array(items) => items.iter().filter_map(stage_from_json).collect(),
                single => stage_from_json(single).into_iter().collect(),
            };
            return Some(stages);
        }
        if let Expr::Invocation { callee, args, .. } = expr {
            if callee.last_name() == Some("Create") {
                let mut stages = Vec::new();
                for arg in args {
                    stages.extend(self.argument_stages(&arg.value).unwrap_or_default());
                }
                return Some(stages);
            }
        }
        let calls = builder_calls(expr, self.locals);
        if calls.is_empty() {
            return None;
        }
        let mut stages = Vec::new();
        for (method, args) in calls {
            self.push_fluent(&mut stages, method, args);
        }
        Some(stages)
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `Group(x => x.CustomerId, g => new { .. })` or a group document.
fn group_fields(expr: &Expr, locals: Locals) -> Vec<FieldExpression> {
    if let Some(Value::Object(map)) = document_value(expr, locals) {
        return map
            .iter()
            .map(|(k, v)| FieldExpression::new(k.clone(), "group", Some(render_json(v))))
            .collect();
    }
    if let Some(path) = field_path(expr) {
        return vec![FieldExpression::new(path, "group", None)];
    }
    extract_projections(expr, locals)
        .into_iter()
        .map(|f| FieldExpression::new(f.path, "group", f.value))
        .collect()
}

/// One `{ "$op": body }` stage document.
pub fn stage_from_json(doc: &Value) -> Option<PipelineStage> {
    let Value::Object(map) = doc else {
        return None;
    };
    let (op, body) = map.iter().find(|(k, _)| k.starts_with('$'))?;
    let mut stage = PipelineStage::new(op.clone());
    let str_field = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    match op.as_str() {
        "$match" => json_filters(body, "", &mut stage.fields, 0),
        "$lookup" | "$graphLookup" => {
            if let Some(from) = str_field("from") {
                let (local, foreign) = if op == "$lookup" {
                    (str_field("localField"), str_field("foreignField"))
                } else {
                    (str_field("connectFromField"), str_field("connectToField"))
                };
                stage.lookup = Some(LookupSpec {
                    from,
                    local_field: local,
                    foreign_field: foreign,
                    as_field: str_field("as"),
                });
            }
        }
        "$unwind" => {
            let path = body
                .as_str()
                .map(str::to_string)
                .or_else(|| str_field("path"));
            if let Some(path) = path {
                stage.fields.push(FieldExpression::new(path.trim_start_matches('$'), "unwind", None));
            }
        }
        "$sort" => {
            if let Value::Object(keys) = body {
                for (path, dir) in keys {
                    let desc = dir.as_i64().is_some_and(|d| d < 0);
                    stage
                        .fields
                        .push(FieldExpression::new(path.clone(), if desc { "desc" } else { "asc" }, None));
                }
            }
        }
        "$project" => {
            if let Value::Object(keys) = body {
                for (path, v) in keys {
                    let op = match v {
                        Value::Number(n) if n.as_i64() == Some(0) => "exclude",
                        Value::Bool(false) => "exclude",
                        Value::Number(_) | Value::Bool(true) => "include",
                        _ => "compute",
                    };
                    let value = matches!(op, "compute").then(|| render_json(v));
                    stage.fields.push(FieldExpression::new(path.clone(), op, value));
                }
            }
        }
        _ => match body {
            Value::Object(keys) => {
                for (k, v) in keys {
                    stage
                        .fields
                        .push(FieldExpression::new(k.clone(), "value", Some(render_json(v))));
                }
            }
            other => stage
                .fields
                .push(FieldExpression::new("", "value", Some(render_json(other)))),
        },
    }
    Some(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_collections(_: &Expr) -> Option<String> {
        None
    }

    fn chain(method: &str, args: Vec<Expr>) -> ChainCall {
        ChainCall {
            method: method.into(),
            type_args: vec![],
            args: args
                .into_iter()
                .map(|value| Argument { name: None, value })
                .collect(),
        }
    }

    fn s(v: &str) -> Expr {
        Expr::StringLiteral(v.into())
    }

    #[test]
    fn lookup_document_stage() {
        let stage = stage_from_json(&json!({
            "$lookup": {"from": "customers", "localField": "customerId", "foreignField": "_id", "as": "customer"}
        }))
        .unwrap();
        let lookup = stage.lookup.unwrap();
        assert_eq!(lookup.from, "customers");
        assert_eq!(lookup.local_field.as_deref(), Some("customerId"));
        assert_eq!(lookup.foreign_field.as_deref(), Some("_id"));
    }

    #[test]
    fn fluent_chain_stages() {
        let resolve = no_collections;
        let reader = PipelineReader::new(&[], &resolve);
        let stages = reader.fluent_stages(&[
            chain("Match", vec![s("{ status: 'paid' }")]),
            chain("Lookup", vec![s("customers"), s("CustomerId"), s("_id"), s("Customer")]),
            chain("SortByDescending", vec![s("Total")]),
            chain("ThenBy", vec![s("CreatedAt")]),
            chain("Limit", vec![Expr::Number("5".into())]),
            chain("ToListAsync", vec![]),
        ]);
        let ops: Vec<_> = stages.iter().map(|s| s.operator.as_str()).collect();
        assert_eq!(ops, vec!["$match", "$lookup", "$sort", "$limit"]);
        assert_eq!(stages[2].fields.len(), 2);
        assert_eq!(stages[1].lookup.as_ref().unwrap().from, "customers");
    }

    #[test]
    fn lookup_resolves_handle_argument() {
        let resolve = |e: &Expr| (e.last_name() == Some("_customers")).then(|| "customers".to_string());
        let reader = PipelineReader::new(&[], &resolve);
        let stages = reader.fluent_stages(&[chain(
            "Lookup",
            vec![Expr::Identifier("_customers".into())],
        )]);
        assert_eq!(stages[0].lookup.as_ref().unwrap().from, "customers");
    }

    #[test]
    fn parsed_pipeline_array() {
        let resolve = no_collections;
        let reader = PipelineReader::new(&[], &resolve);
        let stages = reader
            .argument_stages(&s(
                "[{ $match: { status: 'A' } }, { $group: { _id: '$cust_id', total: { $sum: '$amount' } } }]",
            ))
            .unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].operator, "$group");
    }
}
