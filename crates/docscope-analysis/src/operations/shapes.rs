//! Projections, sorts, updates and find options.

use docscope_core::model::FieldExpression;
use serde_json::Value;

use super::bson::{document_value, local, render_json, Locals};
use super::filters::field_path;
use crate::syntax::{Argument, Expr};

const MAX_CHAIN_DEPTH: usize = 32;

const UPDATE_OPERATORS: &[(&str, &str)] = &[
    ("Set", "$set"),
    ("SetOnInsert", "$setOnInsert"),
    ("Inc", "$inc"),
    ("Mul", "$mul"),
    ("Min", "$min"),
    ("Max", "$max"),
    ("Unset", "$unset"),
    ("Rename", "$rename"),
    ("CurrentDate", "$currentDate"),
    ("Push", "$push"),
    ("PushEach", "$push"),
    ("AddToSet", "$addToSet"),
    ("AddToSetEach", "$addToSet"),
    ("Pull", "$pull"),
    ("PullAll", "$pullAll"),
    ("PullFilter", "$pull"),
    ("PopFirst", "$pop"),
    ("PopLast", "$pop"),
    ("BitwiseAnd", "$bit"),
    ("BitwiseOr", "$bit"),
];

/// Builder calls of a fluent definition, in source order:
/// `Builders<T>.Update.Set(a, 1).Inc(b, 2)` -> `[Set, Inc]`.
pub fn builder_calls<'a>(expr: &'a Expr, locals: Locals<'a>) -> Vec<(&'a str, &'a [Argument])> {
    let mut calls = Vec::new();
    let mut current = expr;
    for _ in 0..MAX_CHAIN_DEPTH {
        match current {
            Expr::Invocation { callee, args, .. } => {
                let Expr::MemberAccess { object, name } = callee.as_ref() else {
                    break;
                };
                calls.push((name.as_str(), args.as_slice()));
                current = object.as_ref();
            }
            Expr::Identifier(name) => match local(locals, name) {
                Some(value) => current = value,
                None => break,
            },
            _ => break,
        }
    }
    calls.reverse();
    calls
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !matches!(s.as_str(), "0" | "false"),
        _ => true,
    }
}

// ---- projections ----

pub fn extract_projections(expr: &Expr, locals: Locals) -> Vec<FieldExpression> {
    let mut out = Vec::new();
    match expr {
        Expr::Lambda { params, body } => {
            if let Some(param) = params.first() {
                lambda_projection(body, param, &mut out);
            }
        }
        other => {
            if let Some(Value::Object(map)) = document_value(other, locals) {
                for (path, value) in &map {
                    let op = if truthy(value) { "include" } else { "exclude" };
                    out.push(FieldExpression::new(path.clone(), op, None));
                }
                return out;
            }
            for (method, args) in builder_calls(other, locals) {
                let op = match method {
                    "Include" => "include",
                    "Exclude" => "exclude",
                    "Slice" => "slice",
                    "ElemMatch" => "elemMatch",
                    "Combine" => {
                        for arg in args {
                            out.extend(extract_projections(&arg.value, locals));
                        }
                        continue;
                    }
                    "Expression" => {
                        if let Some(arg) = args.first() {
                            out.extend(extract_projections(&arg.value, locals));
                        }
                        continue;
                    }
                    _ => continue,
                };
                if let Some(path) = args.first().and_then(|a| field_path(&a.value)) {
                    let value = args.get(1).map(|a| a.value.render());
                    out.push(FieldExpression::new(path, op, value));
                }
            }
        }
    }
    out
}

/// `x => new { x.Name, Total = x.Sum }` or `x => x.Name`.
fn lambda_projection(body: &Expr, param: &str, out: &mut Vec<FieldExpression>) {
    match body {
        Expr::AnonymousObject(members) => {
            for member in members {
                if let Some(path) = field_path(&Expr::Lambda {
                    params: vec![param.to_string()],
                    body: Box::new(member.value.clone()),
                }) {
                    let alias = member.name.clone().filter(|n| *n != path);
                    out.push(FieldExpression::new(path, "include", alias));
                }
            }
        }
        Expr::ObjectCreation { initializer, .. } => {
            for item in initializer {
                if let Expr::Assignment { target, value } = item {
                    if let Some(path) = value.member_path_from(param) {
                        let alias = target.last_name().map(str::to_string).filter(|n| *n != path);
                        out.push(FieldExpression::new(path, "include", alias));
                    }
                }
            }
        }
        other => {
            if let Some(path) = other.member_path_from(param) {
                out.push(FieldExpression::new(path, "include", None));
            }
        }
    }
}

// ---- sorts ----

/// `SortBy` / `ThenByDescending` chain steps and LINQ `OrderBy`.
pub fn sort_step(method: &str, args: &[Argument], locals: Locals) -> Vec<FieldExpression> {
    let direction = match method {
        "SortBy" | "ThenBy" | "OrderBy" => "asc",
        "SortByDescending" | "ThenByDescending" | "OrderByDescending" => "desc",
        "Sort" => {
            return args
                .first()
                .map(|a| extract_sorts(&a.value, locals))
                .unwrap_or_default()
        }
        _ => return Vec::new(),
    };
    args.first()
        .and_then(|a| field_path(&a.value))
        .map(|path| vec![FieldExpression::new(path, direction, None)])
        .unwrap_or_default()
}

/// A sort definition: builder chain or `{ a: 1, b: -1 }` document.
pub fn extract_sorts(expr: &Expr, locals: Locals) -> Vec<FieldExpression> {
    if let Some(Value::Object(map)) = document_value(expr, locals) {
        return map
            .iter()
            .map(|(path, dir)| {
                let desc = dir.as_i64().is_some_and(|d| d < 0);
                FieldExpression::new(path.clone(), if desc { "desc" } else { "asc" }, None)
            })
            .collect();
    }
    let mut out = Vec::new();
    for (method, args) in builder_calls(expr, locals) {
        let direction = match method {
            "Ascending" => "asc",
            "Descending" => "desc",
            "MetaTextScore" => "textScore",
            "Combine" => {
                for arg in args {
                    out.extend(extract_sorts(&arg.value, locals));
                }
                continue;
            }
            _ => continue,
        };
        if let Some(path) = args.first().and_then(|a| field_path(&a.value)) {
            out.push(FieldExpression::new(path, direction, None));
        }
    }
    out
}

// ---- updates ----

pub fn extract_updates(expr: &Expr, locals: Locals) -> Vec<FieldExpression> {
    if let Some(doc) = document_value(expr, locals) {
        return json_updates(&doc);
    }
    let mut out = Vec::new();
    for (method, args) in builder_calls(expr, locals) {
        if method == "Combine" {
            for arg in args {
                match &arg.value {
                    Expr::Collection(items) => {
                        for item in items {
                            out.extend(extract_updates(item, locals));
                        }
                    }
                    other => out.extend(extract_updates(other, locals)),
                }
            }
            continue;
        }
        let Some((_, op)) = UPDATE_OPERATORS.iter().find(|(m, _)| *m == method) else {
            continue;
        };
        if let Some(path) = args.first().and_then(|a| field_path(&a.value)) {
            let value = args.get(1).map(|a| a.value.render());
            out.push(FieldExpression::new(path, *op, value));
        }
    }
    out
}

/// `{ $set: { a: 1 }, $inc: { n: 1 } }`; pipeline-style updates are arrays
/// of such documents.
fn json_updates(doc: &Value) -> Vec<FieldExpression> {
    let mut out = Vec::new();
    match doc {
        Value::Array(stages) => {
            for stage in stages {
                out.extend(json_updates(stage));
            }
        }
        Value::Object(map) => {
            for (op, fields) in map {
                if !op.starts_with('$') {
                    continue;
                }
                if let Value::Object(fields) = fields {
                    for (path, value) in fields {
                        out.push(FieldExpression::new(path.clone(), op.clone(), Some(render_json(value))));
                    }
                }
            }
        }
        _ => {}
    }
    out
}

// ---- options ----

/// Settings read from an options object initializer
/// (`new FindOptions { Limit = 10, Sort = ... }`).
#[derive(Debug, Default, PartialEq)]
pub struct OptionSettings {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub sorts: Vec<FieldExpression>,
    pub projections: Vec<FieldExpression>,
}

pub fn is_options_argument(expr: &Expr, locals: Locals) -> bool {
    match expr {
        Expr::ObjectCreation { type_name, .. } => type_name.ends_with("Options")
            || type_name.contains("Options<"),
        Expr::Identifier(name) => local(locals, name).is_some_and(|v| is_options_argument(v, locals)),
        _ => false,
    }
}

pub fn extract_options(expr: &Expr, locals: Locals) -> OptionSettings {
    let mut settings = OptionSettings::default();
    let initializer = match expr {
        Expr::ObjectCreation { initializer, .. } => initializer,
        Expr::Identifier(name) => {
            return local(locals, name)
                .map(|v| extract_options(v, locals))
                .unwrap_or_default()
        }
        _ => return settings,
    };
    for item in initializer {
        let Expr::Assignment { target, value } = item else {
            continue;
        };
        match target.last_name() {
            Some("Limit") => settings.limit = value.as_i64(),
            Some("Skip") => settings.skip = value.as_i64(),
            Some("Sort") => settings.sorts = extract_sorts(value, locals),
            Some("Projection") => settings.projections = extract_projections(value, locals),
            _ => {}
        }
    }
    settings
}

/// Mode named by `ReadPreference.SecondaryPreferred`,
/// `new ReadPreference(ReadPreferenceMode.Secondary)`, `WriteConcern.WMajority`
/// or `new WriteConcern("majority")`.
pub fn mode_name(expr: &Expr) -> String {
    match expr {
        Expr::ObjectCreation { args, .. } => args
            .first()
            .map(|a| mode_name(&a.value))
            .unwrap_or_else(|| expr.render()),
        Expr::StringLiteral(s) => s.clone(),
        Expr::Number(n) => n.clone(),
        other => other
            .last_name()
            .map(str::to_string)
            .unwrap_or_else(|| other.render()),
    }
}
