//! Filter extraction: lambdas, `Builders<T>.Filter` calls, BSON documents,
//! JSON strings and local filter variables, all reduced to field clauses.

use docscope_core::model::FieldExpression;
use serde_json::Value;

use super::bson::{document_value, local, render_json, Locals};
use crate::syntax::{Argument, Expr};

const MAX_FILTER_DEPTH: usize = 24;

/// Builder methods taking (field, value).
const BUILDER_COMPARISONS: &[(&str, &str)] = &[
    ("Eq", "$eq"),
    ("Ne", "$ne"),
    ("Gt", "$gt"),
    ("Gte", "$gte"),
    ("Lt", "$lt"),
    ("Lte", "$lte"),
    ("In", "$in"),
    ("Nin", "$nin"),
    ("AnyEq", "$eq"),
    ("AnyNe", "$ne"),
    ("AnyIn", "$in"),
    ("AnyNin", "$nin"),
    ("AnyGt", "$gt"),
    ("AnyLt", "$lt"),
    ("Regex", "$regex"),
    ("Type", "$type"),
    ("Size", "$size"),
    ("SizeGt", "$size"),
    ("SizeLt", "$size"),
    ("All", "$all"),
    ("BitsAllSet", "$bitsAllSet"),
    ("Near", "$near"),
    ("GeoWithin", "$geoWithin"),
];

pub fn extract_filters(expr: &Expr, locals: Locals) -> Vec<FieldExpression> {
    let mut out = Vec::new();
    collect(expr, locals, &mut out, 0);
    dedup(&mut out);
    out
}

/// Filter of the first positional argument (or a `filter:` named one).
pub fn filter_argument(args: &[Argument]) -> Option<&Expr> {
    args.iter()
        .find(|a| a.name.as_deref() == Some("filter"))
        .or_else(|| args.iter().find(|a| a.name.is_none()))
        .map(|a| &a.value)
}

fn dedup(out: &mut Vec<FieldExpression>) {
    let mut seen = std::collections::HashSet::new();
    out.retain(|f| seen.insert(f.clone()));
}

fn collect(expr: &Expr, locals: Locals, out: &mut Vec<FieldExpression>, depth: usize) {
    if depth > MAX_FILTER_DEPTH {
        return;
    }
    let d = depth + 1;
    match expr {
        Expr::Lambda { params, body } => {
            if let Some(param) = params.first() {
                predicate(body, param, false, "", out, d);
            }
        }
        Expr::Identifier(name) => {
            if let Some(value) = local(locals, name) {
                collect(value, locals, out, d);
            }
        }
        Expr::Binary { left, op, right } if matches!(op.as_str(), "&" | "|" | "&&" | "||") => {
            collect(left, locals, out, d);
            collect(right, locals, out, d);
        }
        Expr::Unary { op, operand } if op == "!" => {
            let mut inner = Vec::new();
            collect(operand, locals, &mut inner, d);
            out.extend(inner.into_iter().map(negate));
        }
        Expr::Invocation { callee, args, .. } if is_builder_call(callee, locals) => {
            builder(callee.last_name().unwrap_or(""), args, locals, out, d);
        }
        other => {
            if let Some(doc) = document_value(other, locals) {
                json_filters(&doc, "", out, d);
            }
        }
    }
}

/// `Builders<T>.Filter.Eq(..)`, `filter.Eq(..)` on a builder local, or a
/// bare `Filter.Eq(..)` with a `using static`.
fn is_builder_call(callee: &Expr, locals: Locals) -> bool {
    let Some(receiver) = callee.receiver() else {
        return false;
    };
    match receiver {
        Expr::MemberAccess { name, .. } if name == "Filter" => true,
        Expr::Identifier(name) if name == "Filter" => true,
        Expr::Identifier(name) => local(locals, name).is_some_and(|value| {
            matches!(value, Expr::MemberAccess { name, .. } if name == "Filter")
        }),
        _ => false,
    }
}

fn builder(method: &str, args: &[Argument], locals: Locals, out: &mut Vec<FieldExpression>, depth: usize) {
    let field = || args.first().and_then(|a| field_path(&a.value));
    let value = || args.get(1).map(|a| render_value(&a.value, locals));

    if let Some((_, op)) = BUILDER_COMPARISONS.iter().find(|(m, _)| *m == method) {
        if let Some(path) = field() {
            out.push(FieldExpression::new(path, *op, value()));
        }
        return;
    }
    match method {
        "And" | "Or" => {
            for arg in args {
                match &arg.value {
                    Expr::Collection(items) => {
                        for item in items {
                            collect(item, locals, out, depth);
                        }
                    }
                    other => collect(other, locals, out, depth),
                }
            }
        }
        "Not" => {
            let mut inner = Vec::new();
            for arg in args {
                collect(&arg.value, locals, &mut inner, depth);
            }
            out.extend(inner.into_iter().map(negate));
        }
        "Exists" => {
            if let Some(path) = field() {
                out.push(FieldExpression::new(
                    path,
                    "$exists",
                    Some(value().unwrap_or_else(|| "true".to_string())),
                ));
            }
        }
        "ElemMatch" => {
            let Some(path) = field() else { return };
            match args.get(1).map(|a| &a.value) {
                Some(Expr::Lambda { params, body }) if !params.is_empty() => {
                    let mut inner = Vec::new();
                    predicate(body, &params[0], false, &format!("{path}."), &mut inner, depth);
                    if inner.is_empty() {
                        out.push(FieldExpression::new(path, "$elemMatch", None));
                    }
                    out.extend(inner);
                }
                Some(other) => {
                    let mut inner = Vec::new();
                    collect(other, locals, &mut inner, depth);
                    if inner.is_empty() {
                        out.push(FieldExpression::new(path.clone(), "$elemMatch", Some(other.render())));
                    }
                    out.extend(inner.into_iter().map(|f| {
                        FieldExpression::new(format!("{path}.{}", f.path), f.operator, f.value)
                    }));
                }
                None => {}
            }
        }
        "Text" => out.push(FieldExpression::new(
            "$text",
            "$text",
            args.first().map(|a| render_value(&a.value, locals)),
        )),
        "Where" => {
            if let Some(arg) = args.first() {
                collect(&arg.value, locals, out, depth);
            }
        }
        _ => {}
    }
}

/// Field named by a builder's first argument: `x => x.Customer.Id` or `"customer.id"`.
pub fn field_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lambda { params, body } => {
            let param = params.first()?;
            member_path(body, param)
        }
        Expr::StringLiteral(s) => Some(s.clone()),
        Expr::Invocation { callee, args, .. } if callee.last_name() == Some("nameof") => {
            args.first().and_then(|a| a.value.last_name()).map(str::to_string)
        }
        _ => None,
    }
}

/// `x.Lines[-1].Sku` / `x.Lines.First().Sku` reduce to `Lines.Sku`.
fn member_path(expr: &Expr, param: &str) -> Option<String> {
    match expr {
        Expr::ElementAccess { object, .. } => member_path(object, param),
        Expr::Invocation { callee, args, .. }
            if args.is_empty() && matches!(callee.last_name(), Some("First" | "Single")) =>
        {
            callee.receiver().and_then(|r| member_path(r, param))
        }
        Expr::MemberAccess { object, name } => {
            if matches!(object.as_ref(), Expr::Identifier(p) if p == param) {
                return Some(name.clone());
            }
            member_path(object, param).map(|prefix| format!("{prefix}.{name}"))
        }
        _ => expr.member_path_from(param),
    }
}

fn render_value(expr: &Expr, locals: Locals) -> String {
    if let Some(doc) = document_value(expr, locals) {
        return render_json(&doc);
    }
    expr.render()
}

fn negate(f: FieldExpression) -> FieldExpression {
    let op = match f.operator.as_str() {
        "$eq" => "$ne",
        "$ne" => "$eq",
        "$gt" => "$lte",
        "$gte" => "$lt",
        "$lt" => "$gte",
        "$lte" => "$gt",
        "$in" => "$nin",
        "$nin" => "$in",
        _ => {
            return FieldExpression::new(
                f.path,
                "$not",
                Some(format!("{} {}", f.operator, f.value.unwrap_or_default()).trim().to_string()),
            )
        }
    };
    FieldExpression::new(f.path, op, f.value)
}

fn comparison(op: &str) -> Option<&'static str> {
    Some(match op {
        "==" => "$eq",
        "!=" => "$ne",
        ">" => "$gt",
        ">=" => "$gte",
        "<" => "$lt",
        "<=" => "$lte",
        _ => return None,
    })
}

fn flipped(op: &'static str) -> &'static str {
    match op {
        "$gt" => "$lt",
        "$gte" => "$lte",
        "$lt" => "$gt",
        "$lte" => "$gte",
        other => other,
    }
}

/// Lambda body over parameter `param`.
fn predicate(
    body: &Expr,
    param: &str,
    negated: bool,
    prefix: &str,
    out: &mut Vec<FieldExpression>,
    depth: usize,
) {
    if depth > MAX_FILTER_DEPTH {
        return;
    }
    let d = depth + 1;
    let mut push = |path: String, op: &str, value: Option<String>| {
        let f = FieldExpression::new(format!("{prefix}{path}"), op, value);
        out.push(if negated { negate(f) } else { f });
    };
    match body {
        Expr::Binary { left, op, right } if op == "&&" || op == "||" => {
            predicate(left, param, negated, prefix, out, d);
            predicate(right, param, negated, prefix, out, d);
        }
        Expr::Binary { left, op, right } => {
            let Some(mongo_op) = comparison(op) else {
                return;
            };
            if let Some(path) = member_path(left, param) {
                push(path, mongo_op, Some(right.render()));
            } else if let Some(path) = member_path(right, param) {
                push(path, flipped(mongo_op), Some(left.render()));
            }
        }
        Expr::Unary { op, operand } if op == "!" => {
            predicate(operand, param, !negated, prefix, out, d);
        }
        Expr::MemberAccess { .. } => {
            if let Some(path) = member_path(body, param) {
                push(path, "$eq", Some("true".to_string()));
            }
        }
        Expr::Invocation { callee, args, .. } => {
            let method = callee.last_name().unwrap_or("");
            let receiver = callee.receiver();
            let receiver_path = receiver.and_then(|r| member_path(r, param));
            let first = args.first().map(|a| &a.value);
            match (method, receiver_path, first) {
                ("Contains", Some(path), Some(arg)) => {
                    push(path, "$regex", Some(arg.render()));
                }
                ("Contains", None, Some(arg)) => {
                    if let (Some(path), Some(list)) = (member_path(arg, param), receiver) {
                        push(path, "$in", Some(list.render()));
                    }
                }
                ("StartsWith", Some(path), Some(arg)) => {
                    push(path, "$regex", Some(format!("^{}", regex_text(arg))));
                }
                ("EndsWith", Some(path), Some(arg)) => {
                    push(path, "$regex", Some(format!("{}$", regex_text(arg))));
                }
                ("Equals", Some(path), Some(arg)) => push(path, "$eq", Some(arg.render())),
                ("Any", Some(path), Some(Expr::Lambda { params, body })) if !params.is_empty() => {
                    let nested = format!("{prefix}{path}.");
                    predicate(body, &params[0], negated, &nested, out, d);
                }
                ("Any", Some(path), None) => {
                    push(path, "$exists", Some("true".to_string()));
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn regex_text(expr: &Expr) -> String {
    expr.as_str_literal()
        .map(str::to_string)
        .unwrap_or_else(|| expr.render())
}

/// Filter documents: `{ status: "A", total: { $gt: 10 }, $or: [ ... ] }`.
pub fn json_filters(doc: &Value, prefix: &str, out: &mut Vec<FieldExpression>, depth: usize) {
    if depth > MAX_FILTER_DEPTH {
        return;
    }
    let Value::Object(map) = doc else {
        return;
    };
    for (key, value) in map {
        match key.as_str() {
            "$and" | "$or" | "$nor" => {
                if let Value::Array(items) = value {
                    for item in items {
                        json_filters(item, prefix, out, depth + 1);
                    }
                }
            }
            "$expr" | "$where" | "$comment" => {}
            "$text" => out.push(FieldExpression::new("$text", "$text", Some(render_json(value)))),
            field => {
                let path = format!("{prefix}{field}");
                match value {
                    Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => {
                        for (op, operand) in ops {
                            if op == "$elemMatch" {
                                json_filters(operand, &format!("{path}."), out, depth + 1);
                            } else {
                                out.push(FieldExpression::new(
                                    path.clone(),
                                    op.clone(),
                                    Some(render_json(operand)),
                                ));
                            }
                        }
                    }
                    other => out.push(FieldExpression::new(path, "$eq", Some(render_json(other)))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Expr {
        Expr::Identifier(name.into())
    }

    fn member(object: Expr, name: &str) -> Expr {
        Expr::MemberAccess {
            object: Box::new(object),
            name: name.into(),
        }
    }

    fn bin(left: Expr, op: &str, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op: op.into(),
            right: Box::new(right),
        }
    }

    fn lambda(param: &str, body: Expr) -> Expr {
        Expr::Lambda {
            params: vec![param.into()],
            body: Box::new(body),
        }
    }

    fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Invocation {
            callee: Box::new(callee),
            type_args: vec![],
            args: args
                .into_iter()
                .map(|value| Argument { name: None, value })
                .collect(),
        }
    }

    fn filter_builder() -> Expr {
        member(id("Builders"), "Filter")
    }

    #[test]
    fn lambda_comparisons_and_flips() {
        let f = extract_filters(
            &lambda(
                "o",
                bin(
                    bin(member(id("o"), "CustomerId"), "==", id("customerId")),
                    "&&",
                    bin(Expr::Number("10".into()), "<", member(id("o"), "Total")),
                ),
            ),
            &[],
        );
        assert_eq!(
            f,
            vec![
                FieldExpression::new("CustomerId", "$eq", Some("customerId".into())),
                FieldExpression::new("Total", "$gt", Some("10".into())),
            ]
        );
    }

    #[test]
    fn negated_bool_member() {
        let f = extract_filters(
            &lambda(
                "u",
                Expr::Unary {
                    op: "!".into(),
                    operand: Box::new(member(id("u"), "IsDeleted")),
                },
            ),
            &[],
        );
        assert_eq!(f, vec![FieldExpression::new("IsDeleted", "$ne", Some("true".into()))]);
    }

    #[test]
    fn contains_on_list_is_in() {
        let f = extract_filters(
            &lambda(
                "p",
                call(member(id("ids"), "Contains"), vec![member(id("p"), "Id")]),
            ),
            &[],
        );
        assert_eq!(f, vec![FieldExpression::new("Id", "$in", Some("ids".into()))]);
    }

    #[test]
    fn any_prefixes_nested_paths() {
        let f = extract_filters(
            &lambda(
                "o",
                call(
                    member(member(id("o"), "Lines"), "Any"),
                    vec![lambda("l", bin(member(id("l"), "ProductId"), "==", id("pid")))],
                ),
            ),
            &[],
        );
        assert_eq!(f[0].path, "Lines.ProductId");
    }

    #[test]
    fn builder_chain_through_local() {
        let eq = call(
            member(filter_builder(), "Eq"),
            vec![
                lambda("o", member(id("o"), "Status")),
                Expr::StringLiteral("open".into()),
            ],
        );
        let gt = call(
            member(filter_builder(), "Gte"),
            vec![Expr::StringLiteral("total".into()), Expr::Number("5".into())],
        );
        let locals = vec![("filter".to_string(), bin(eq, "&", gt))];
        let f = extract_filters(&id("filter"), &locals);
        assert_eq!(
            f,
            vec![
                FieldExpression::new("Status", "$eq", Some("\"open\"".into())),
                FieldExpression::new("total", "$gte", Some("5".into())),
            ]
        );
    }

    #[test]
    fn builder_not_negates() {
        let f = extract_filters(
            &call(
                member(filter_builder(), "Not"),
                vec![call(
                    member(filter_builder(), "In"),
                    vec![Expr::StringLiteral("state".into()), id("states")],
                )],
            ),
            &[],
        );
        assert_eq!(f, vec![FieldExpression::new("state", "$nin", Some("states".into()))]);
    }

    #[test]
    fn json_string_filter() {
        let f = extract_filters(
            &Expr::StringLiteral("{ status: 'A', $or: [ { qty: { $lt: 30 } } ] }".into()),
            &[],
        );
        assert!(f.contains(&FieldExpression::new("status", "$eq", Some("A".into()))));
        assert!(f.contains(&FieldExpression::new("qty", "$lt", Some("30".into()))));
    }

    #[test]
    fn elem_match_with_builder_or_opaque_filter() {
        let elem = |inner: Expr| {
            call(
                member(filter_builder(), "ElemMatch"),
                vec![Expr::StringLiteral("lines".into()), inner],
            )
        };
        let nested = call(
            member(filter_builder(), "Eq"),
            vec![Expr::StringLiteral("sku".into()), Expr::StringLiteral("A-1".into())],
        );
        let f = extract_filters(&elem(nested), &[]);
        assert_eq!(f, vec![FieldExpression::new("lines.sku", "$eq", Some("\"A-1\"".into()))]);

        let f = extract_filters(&elem(id("lineFilter")), &[]);
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].path, "lines");
        assert_eq!(f[0].operator, "$elemMatch");
        assert!(f[0].value.is_some());
    }
}
