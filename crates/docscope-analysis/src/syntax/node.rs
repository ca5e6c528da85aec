//! Small helpers over tree-sitter nodes.

use tree_sitter::Node;

pub fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub fn field_text<'a>(node: Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| text(n, source))
}

pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub fn first_named_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    named_children(node)
        .into_iter()
        .find(|c| kinds.contains(&c.kind()))
}

/// `modifier` children as written (`public`, `static`, `readonly`, ...).
pub fn modifiers<'a>(node: Node, source: &'a [u8]) -> Vec<&'a str> {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "modifier")
        .map(|c| text(c, source).trim())
        .collect()
}

/// Collapse whitespace inside type text (`List< Order >` -> `List<Order>`).
pub fn compact(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("").replace(',', ", ")
}

/// Simple name of a possibly qualified or generic type: `Shop.Models.Order` -> `Order`,
/// `IMongoCollection<Order>` -> `IMongoCollection`.
pub fn simple_type_name(type_text: &str) -> &str {
    let base = type_text.split('<').next().unwrap_or(type_text);
    let base = base.trim().trim_end_matches('?').trim_end_matches("[]");
    base.rsplit(['.', ':']).next().unwrap_or(base).trim()
}

/// First generic argument: `IMongoCollection<Shop.Order>` -> `Shop.Order`.
pub fn generic_argument(type_text: &str) -> Option<&str> {
    let open = type_text.find('<')?;
    let close = type_text.rfind('>')?;
    if close <= open + 1 {
        return None;
    }
    let inner = &type_text[open + 1..close];
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(inner[..i].trim()),
            _ => {}
        }
    }
    Some(inner.trim())
}
