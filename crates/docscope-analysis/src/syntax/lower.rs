//! Lowering tree-sitter C# nodes into [`Expr`].
//!
//! One arm per node kind, in the same `match node.kind()` shape the rest of the
//! analyzer uses. Unknown kinds fall back to [`Expr::Other`] with source text.

use tree_sitter::Node;

use super::expr::{Argument, Expr, ObjectMember};
use super::node::{children, compact, field_text, named_children, text};

/// Deeply nested expressions beyond this are kept as text.
const MAX_LOWER_DEPTH: usize = 48;

pub fn lower_expr(node: Node, source: &[u8]) -> Expr {
    lower(node, source, 0)
}

/// Lower an `argument_list` (or `bracketed_argument_list`).
pub fn lower_arguments(node: Node, source: &[u8]) -> Vec<Argument> {
    args(node, source, 0)
}

fn lower(node: Node, source: &[u8], depth: usize) -> Expr {
    if depth > MAX_LOWER_DEPTH {
        return Expr::Other(text(node, source).to_string());
    }
    let d = depth + 1;
    match node.kind() {
        "string_literal" => Expr::StringLiteral(unquote_regular(text(node, source))),
        "verbatim_string_literal" => Expr::StringLiteral(unquote_verbatim(text(node, source))),
        "raw_string_literal" => Expr::StringLiteral(unquote_raw(text(node, source))),
        "interpolated_string_expression" => interpolated(node, source, d),
        "integer_literal" | "real_literal" => Expr::Number(text(node, source).to_string()),
        "boolean_literal" | "true" | "false" => Expr::Bool(text(node, source) == "true"),
        "null_literal" => Expr::Null,
        "identifier" | "predefined_type" | "qualified_name" | "alias_qualified_name" => {
            Expr::Identifier(text(node, source).to_string())
        }
        "generic_name" => Expr::Identifier(generic_base(node, source)),
        "this" | "this_expression" => Expr::Identifier("this".to_string()),
        "member_access_expression" => {
            let object = match node.child_by_field_name("expression") {
                Some(e) => lower(e, source, d),
                None => return Expr::Other(text(node, source).to_string()),
            };
            let name = node
                .child_by_field_name("name")
                .map(|n| simple_name(n, source))
                .unwrap_or_default();
            Expr::MemberAccess {
                object: Box::new(object),
                name,
            }
        }
        "element_access_expression" => {
            let object = node
                .child_by_field_name("expression")
                .map(|e| lower(e, source, d))
                .unwrap_or(Expr::Null);
            let index = node
                .child_by_field_name("subscript")
                .map(|s| args(s, source, d))
                .and_then(|a| a.into_iter().next())
                .map(|a| a.value)
                .unwrap_or(Expr::Null);
            Expr::ElementAccess {
                object: Box::new(object),
                index: Box::new(index),
            }
        }
        "invocation_expression" => invocation(node, source, d),
        "binary_expression" => {
            let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) else {
                return Expr::Other(text(node, source).to_string());
            };
            Expr::Binary {
                left: Box::new(lower(left, source, d)),
                op: field_text(node, "operator", source).unwrap_or("").to_string(),
                right: Box::new(lower(right, source, d)),
            }
        }
        "prefix_unary_expression" | "unary_expression" => {
            let op = children(node)
                .into_iter()
                .next()
                .filter(|c| !c.is_named())
                .map(|c| text(c, source).to_string())
                .unwrap_or_default();
            match named_children(node).into_iter().next() {
                Some(operand) => Expr::Unary {
                    op,
                    operand: Box::new(lower(operand, source, d)),
                },
                None => Expr::Other(text(node, source).to_string()),
            }
        }
        // `x!`, `(x)`, `await x`, `(T)x` reduce to the wrapped expression.
        "postfix_unary_expression" | "parenthesized_expression" => {
            match named_children(node).into_iter().next() {
                Some(inner) => lower(inner, source, d),
                None => Expr::Other(text(node, source).to_string()),
            }
        }
        "await_expression" => match named_children(node).into_iter().last() {
            Some(inner) => lower(inner, source, d),
            None => Expr::Other(text(node, source).to_string()),
        },
        "cast_expression" => match node.child_by_field_name("value") {
            Some(value) => lower(value, source, d),
            None => Expr::Other(text(node, source).to_string()),
        },
        "lambda_expression" => lambda(node, source, d),
        "object_creation_expression" | "implicit_object_creation_expression" => {
            object_creation(node, source, d)
        }
        "anonymous_object_creation_expression" => anonymous_object(node, source, d),
        "initializer_expression" | "collection_expression" => Expr::Collection(
            named_children(node)
                .into_iter()
                .map(|c| lower_element(c, source, d))
                .collect(),
        ),
        "array_creation_expression"
        | "implicit_array_creation_expression"
        | "stackalloc_expression" => {
            let items = named_children(node)
                .into_iter()
                .find(|c| c.kind() == "initializer_expression")
                .map(|init| {
                    named_children(init)
                        .into_iter()
                        .map(|c| lower(c, source, d))
                        .collect()
                })
                .unwrap_or_default();
            Expr::Collection(items)
        }
        "assignment_expression" => {
            let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) else {
                return Expr::Other(text(node, source).to_string());
            };
            Expr::Assignment {
                target: Box::new(lower(left, source, d)),
                value: Box::new(lower(right, source, d)),
            }
        }
        "typeof_expression" => Expr::TypeOf(
            node.child_by_field_name("type")
                .or_else(|| named_children(node).into_iter().next())
                .map(|t| compact(text(t, source)))
                .unwrap_or_default(),
        ),
        _ => Expr::Other(text(node, source).to_string()),
    }
}

/// Collection-expression elements may be wrapped (`expression_element`).
fn lower_element(node: Node, source: &[u8], depth: usize) -> Expr {
    if node.kind() == "expression_element" || node.kind() == "spread_element" {
        if let Some(inner) = named_children(node).into_iter().next() {
            return lower(inner, source, depth);
        }
    }
    lower(node, source, depth)
}

fn invocation(node: Node, source: &[u8], depth: usize) -> Expr {
    let Some(function) = node.child_by_field_name("function") else {
        return Expr::Other(text(node, source).to_string());
    };
    let type_args = type_arguments(function, source);
    let args = node
        .child_by_field_name("arguments")
        .map(|a| args(a, source, depth))
        .unwrap_or_default();
    Expr::Invocation {
        callee: Box::new(lower(function, source, depth)),
        type_args,
        args,
    }
}

/// Generic arguments written on an invoked name: `GetCollection<Order>` or
/// `db.GetCollection<Order>`.
pub(crate) fn type_arguments(function: Node, source: &[u8]) -> Vec<String> {
    let name = match function.kind() {
        "generic_name" => Some(function),
        "member_access_expression" => function
            .child_by_field_name("name")
            .filter(|n| n.kind() == "generic_name"),
        _ => None,
    };
    name.and_then(|n| {
        named_children(n)
            .into_iter()
            .find(|c| c.kind() == "type_argument_list")
    })
    .map(|list| {
        named_children(list)
            .into_iter()
            .map(|t| compact(text(t, source)))
            .collect()
    })
    .unwrap_or_default()
}

fn args(list: Node, source: &[u8], depth: usize) -> Vec<Argument> {
    named_children(list)
        .into_iter()
        .filter(|c| c.kind() == "argument")
        .filter_map(|arg| {
            let name_node = arg.child_by_field_name("name");
            let value = named_children(arg)
                .into_iter()
                .filter(|c| Some(*c) != name_node)
                .last()?;
            Some(Argument {
                name: name_node.map(|n| text(n, source).to_string()),
                value: lower(value, source, depth),
            })
        })
        .collect()
}

fn lambda(node: Node, source: &[u8], depth: usize) -> Expr {
    let params = match node.child_by_field_name("parameters") {
        Some(p) if p.kind() == "parameter_list" => named_children(p)
            .into_iter()
            .filter_map(|param| field_text(param, "name", source).map(str::to_string))
            .collect(),
        Some(p) => vec![text(p, source).to_string()],
        None => Vec::new(),
    };
    let body = match node.child_by_field_name("body") {
        Some(block) if block.kind() == "block" => returned_expression(block)
            .map(|e| lower(e, source, depth))
            .unwrap_or_else(|| Expr::Other(text(block, source).to_string())),
        Some(body) => lower(body, source, depth),
        None => Expr::Null,
    };
    Expr::Lambda {
        params,
        body: Box::new(body),
    }
}

/// Expression of the first `return` in a block-bodied lambda.
fn returned_expression(block: Node) -> Option<Node> {
    named_children(block)
        .into_iter()
        .find(|s| s.kind() == "return_statement")
        .and_then(|r| named_children(r).into_iter().next())
}

fn object_creation(node: Node, source: &[u8], depth: usize) -> Expr {
    let type_name = node
        .child_by_field_name("type")
        .map(|t| compact(text(t, source)))
        .unwrap_or_default();
    let mut arguments = Vec::new();
    let mut initializer = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "argument_list" => arguments = args(child, source, depth),
            "initializer_expression" => {
                initializer = named_children(child)
                    .into_iter()
                    .map(|c| lower(c, source, depth))
                    .collect()
            }
            _ => {}
        }
    }
    Expr::ObjectCreation {
        type_name,
        args: arguments,
        initializer,
    }
}

fn anonymous_object(node: Node, source: &[u8], depth: usize) -> Expr {
    let mut members = Vec::new();
    let mut pending_name: Option<String> = None;
    for child in named_children(node) {
        if child.kind() == "name_equals" {
            pending_name = named_children(child)
                .into_iter()
                .next()
                .map(|n| text(n, source).to_string());
            continue;
        }
        members.push(ObjectMember {
            name: pending_name.take(),
            value: lower(child, source, depth),
        });
    }
    Expr::AnonymousObject(members)
}

/// Split `$"prefix_{expr}_suffix"` into literal and expression parts using
/// byte ranges, so literal chunks survive whatever node kinds the grammar
/// uses for them.
fn interpolated(node: Node, source: &[u8], depth: usize) -> Expr {
    let full = text(node, source);
    let Some(open) = full.find('"') else {
        return Expr::Other(full.to_string());
    };
    let content_start = node.start_byte() + open + 1;
    let content_end = node.end_byte().saturating_sub(1).max(content_start);
    let mut parts = Vec::new();
    let mut cursor = content_start;
    let mut holes: Vec<Node> = named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "interpolation")
        .collect();
    holes.sort_by_key(|n| n.start_byte());
    for hole in holes {
        if hole.start_byte() > cursor {
            push_literal(&mut parts, &source[cursor..hole.start_byte()]);
        }
        if let Some(inner) = named_children(hole).into_iter().next() {
            parts.push(lower(inner, source, depth));
        }
        cursor = hole.end_byte();
    }
    if content_end > cursor {
        push_literal(&mut parts, &source[cursor..content_end]);
    }
    Expr::Interpolated(parts)
}

fn push_literal(parts: &mut Vec<Expr>, bytes: &[u8]) {
    let chunk = String::from_utf8_lossy(bytes)
        .replace("{{", "{")
        .replace("}}", "}");
    if !chunk.is_empty() {
        parts.push(Expr::StringLiteral(chunk));
    }
}

fn generic_base(node: Node, source: &[u8]) -> String {
    named_children(node)
        .into_iter()
        .find(|c| c.kind() == "identifier")
        .map(|c| text(c, source).to_string())
        .unwrap_or_else(|| text(node, source).to_string())
}

fn simple_name(node: Node, source: &[u8]) -> String {
    if node.kind() == "generic_name" {
        generic_base(node, source)
    } else {
        text(node, source).to_string()
    }
}

fn unquote_regular(raw: &str) -> String {
    let raw = raw.strip_suffix("u8").unwrap_or(raw);
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn unquote_verbatim(raw: &str) -> String {
    raw.strip_prefix("@\"")
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .replace("\"\"", "\"")
}

fn unquote_raw(raw: &str) -> String {
    raw.trim_start_matches('"')
        .trim_end_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::parsers::parse_csharp;

    /// Lower the initializer of `var value = <expr>;` inside a method.
    fn lower_snippet(expr: &str) -> Expr {
        let source = format!("class C {{ void M() {{ var value = {expr}; }} }}");
        let parsed = parse_csharp(&source, Path::new("C.cs")).unwrap();
        let root = parsed.tree.root_node();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "variable_declarator" {
                let value = named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() != "identifier")
                    .last()
                    .map(|c| {
                        if c.kind() == "equals_value_clause" {
                            named_children(c).into_iter().next().unwrap()
                        } else {
                            c
                        }
                    })
                    .unwrap();
                return lower_expr(value, source.as_bytes());
            }
            stack.extend(named_children(node));
        }
        panic!("no declarator in {source}");
    }

    #[test]
    fn lowers_literals() {
        assert_eq!(lower_snippet("\"orders\""), Expr::StringLiteral("orders".into()));
        assert_eq!(lower_snippet("@\"a\"\"b\""), Expr::StringLiteral("a\"b".into()));
        assert_eq!(lower_snippet("42"), Expr::Number("42".into()));
        assert_eq!(lower_snippet("true"), Expr::Bool(true));
        assert_eq!(lower_snippet("null"), Expr::Null);
    }

    #[test]
    fn lowers_member_access_and_concatenation() {
        let e = lower_snippet("Constants.Prefix + \"orders\"");
        match e {
            Expr::Binary { left, op, right } => {
                assert_eq!(op, "+");
                assert_eq!(left.path(), Some(vec!["Constants", "Prefix"]));
                assert_eq!(right.as_str_literal(), Some("orders"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lowers_generic_invocation_with_named_argument() {
        let e = lower_snippet("db.GetCollection<Order>(name: \"orders\")");
        match e {
            Expr::Invocation {
                callee,
                type_args,
                args,
            } => {
                assert_eq!(callee.last_name(), Some("GetCollection"));
                assert_eq!(type_args, vec!["Order".to_string()]);
                assert_eq!(args.len(), 1);
                assert_eq!(args[0].name.as_deref(), Some("name"));
                assert_eq!(args[0].value.as_str_literal(), Some("orders"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lowers_lambda_predicate() {
        let e = lower_snippet("o => o.CustomerId == id && o.Total > 10");
        let Expr::Lambda { params, body } = e else {
            panic!("expected lambda");
        };
        assert_eq!(params, vec!["o".to_string()]);
        assert!(matches!(*body, Expr::Binary { ref op, .. } if op == "&&"));
    }

    #[test]
    fn lowers_interpolation_parts() {
        let e = lower_snippet("$\"{Prefix}_orders\"");
        let Expr::Interpolated(parts) = e else {
            panic!("expected interpolation");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], Expr::Identifier("Prefix".into()));
        assert_eq!(parts[1], Expr::StringLiteral("_orders".into()));
    }

    #[test]
    fn lowers_bson_document_initializer() {
        let e = lower_snippet("new BsonDocument { { \"status\", \"open\" } }");
        let Expr::ObjectCreation {
            type_name,
            initializer,
            ..
        } = e
        else {
            panic!("expected object creation");
        };
        assert_eq!(type_name, "BsonDocument");
        assert_eq!(initializer.len(), 1);
        assert!(matches!(&initializer[0], Expr::Collection(items) if items.len() == 2));
    }
}
