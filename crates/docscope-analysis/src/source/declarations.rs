//! Type, member and attribute extraction.

use std::collections::BTreeMap;

use docscope_core::model::{AttributeConfig, FieldDefinition, NullabilityContext};
use tree_sitter::Node;

use crate::syntax::node::{
    compact, field_text, generic_argument, modifiers, named_children, simple_type_name, text,
};
use crate::syntax::{lower_expr, Expr};

/// Type names that are infrastructure, not stored documents.
const NON_ENTITY_SUFFIXES: &[&str] = &[
    "Settings",
    "Options",
    "Configuration",
    "Config",
    "Context",
    "Repository",
    "Service",
    "Controller",
    "Extensions",
    "Constants",
];

/// Generic collection types whose element type carries the data.
const COLLECTION_TYPES: &[&str] = &[
    "List",
    "IList",
    "ICollection",
    "IEnumerable",
    "IReadOnlyList",
    "IReadOnlyCollection",
    "HashSet",
    "ISet",
    "SortedSet",
    "Collection",
    "ObservableCollection",
    "ImmutableList",
    "ImmutableArray",
    "LinkedList",
];

const VALUE_TYPES: &[&str] = &[
    "int", "long", "short", "byte", "sbyte", "uint", "ulong", "ushort", "double", "float",
    "decimal", "bool", "char", "Int32", "Int64", "Int16", "Double", "Single", "Decimal",
    "Boolean", "DateTime", "DateTimeOffset", "DateOnly", "TimeOnly", "TimeSpan", "Guid",
    "ObjectId", "Decimal128",
];

/// Attributes that name the collection of the type they decorate.
pub const COLLECTION_ATTRIBUTES: &[&str] =
    &["BsonCollection", "CollectionName", "Collection", "MongoCollection"];

pub fn is_value_type(type_name: &str) -> bool {
    VALUE_TYPES.contains(&type_name)
}

/// Element type of a collection-typed member: `List<OrderLine>` -> `OrderLine`,
/// `Tag[]` -> `Tag`. `None` for non-collections (including `string`).
pub fn collection_element(type_text: &str) -> Option<String> {
    let t = type_text.trim().trim_end_matches('?');
    if let Some(inner) = t.strip_suffix("[]") {
        return Some(inner.trim_end_matches('?').to_string());
    }
    if !t.contains('<') || !COLLECTION_TYPES.contains(&simple_type_name(t)) {
        return None;
    }
    generic_argument(t).map(|a| a.trim_end_matches('?').to_string())
}

pub fn is_infrastructure_name(name: &str) -> bool {
    NON_ENTITY_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Attribute lists directly attached to `node`.
pub fn attributes(node: Node, source: &[u8]) -> Vec<AttributeConfig> {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "attribute_list")
        .flat_map(named_children)
        .filter(|a| a.kind() == "attribute")
        .map(|a| parse_attribute(a, source))
        .collect()
}

/// First positional argument expression of the named attribute on `node`.
pub fn attribute_argument_expr(node: Node, attribute: &str, source: &[u8]) -> Option<Expr> {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "attribute_list")
        .flat_map(named_children)
        .filter(|a| a.kind() == "attribute")
        .find(|a| attribute_name(*a, source) == attribute)
        .and_then(|a| attribute_arguments(a).into_iter().next())
        .and_then(|arg| positional_value(arg))
        .map(|value| lower_expr(value, source))
}

fn attribute_name(attr: Node, source: &[u8]) -> String {
    let raw = field_text(attr, "name", source).unwrap_or_else(|| text(attr, source));
    let simple = simple_type_name(raw);
    simple.strip_suffix("Attribute").unwrap_or(simple).to_string()
}

fn attribute_arguments(attr: Node) -> Vec<Node> {
    named_children(attr)
        .into_iter()
        .find(|c| c.kind() == "attribute_argument_list")
        .map(|list| {
            named_children(list)
                .into_iter()
                .filter(|c| c.kind() == "attribute_argument")
                .collect()
        })
        .unwrap_or_default()
}

fn positional_value(arg: Node) -> Option<Node> {
    let parts = named_children(arg);
    match parts.as_slice() {
        [value] => Some(*value),
        _ => None,
    }
}

fn parse_attribute(attr: Node, source: &[u8]) -> AttributeConfig {
    let mut config = AttributeConfig {
        name: attribute_name(attr, source),
        arguments: Vec::new(),
        named_arguments: BTreeMap::new(),
    };
    for arg in attribute_arguments(attr) {
        let parts = named_children(arg);
        match parts.as_slice() {
            [value] => config.arguments.push(attribute_value(*value, source)),
            [name, value, ..] => {
                let key = if name.kind() == "name_equals" {
                    named_children(*name)
                        .into_iter()
                        .next()
                        .map(|n| text(n, source).to_string())
                        .unwrap_or_default()
                } else {
                    text(*name, source).to_string()
                };
                config
                    .named_arguments
                    .insert(key, attribute_value(*value, source));
            }
            [] => {}
        }
    }
    config
}

fn attribute_value(node: Node, source: &[u8]) -> String {
    match lower_expr(node, source) {
        Expr::StringLiteral(s) => s,
        Expr::TypeOf(t) => t,
        other => other.render(),
    }
}

/// Base types listed after `:`.
pub fn base_types(node: Node, source: &[u8]) -> Vec<String> {
    named_children(node)
        .into_iter()
        .find(|c| c.kind() == "base_list")
        .map(|list| {
            named_children(list)
                .into_iter()
                .map(|t| {
                    // `record Admin(string Name) : User(Name)` lists a constructor call.
                    let raw = text(t, source);
                    compact(raw.split('(').next().unwrap_or(raw))
                })
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `#nullable` directives by 1-based line.
pub fn nullable_directives(source: &str) -> Vec<(u32, NullabilityContext)> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let rest = line.trim_start().strip_prefix("#nullable")?;
            let setting = rest.split_whitespace().next()?;
            let context = match setting {
                "enable" => NullabilityContext::Enabled,
                "disable" => NullabilityContext::Disabled,
                "restore" => NullabilityContext::Unspecified,
                _ => return None,
            };
            Some((i as u32 + 1, context))
        })
        .collect()
}

/// Shape one data member.
pub fn build_field(
    name: &str,
    type_text: &str,
    member_modifiers: &[&str],
    attributes: Vec<AttributeConfig>,
    default_value: Option<String>,
    context: NullabilityContext,
) -> FieldDefinition {
    let field_type = compact(type_text);
    let element_type = collection_element(&field_type);
    let base = simple_type_name(&field_type);
    let explicit_nullable = field_type.ends_with('?') || field_type.starts_with("Nullable<");
    let nullable = explicit_nullable
        || (context != NullabilityContext::Enabled
            && !is_value_type(base)
            && element_type.is_none());
    let has = |n: &str| attributes.iter().any(|a| a.name == n);
    let is_id = has("BsonId") || name == "Id" || name == "_id";
    let element_name = attributes
        .iter()
        .find(|a| a.name == "BsonElement")
        .and_then(|a| a.first_argument())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if is_id {
                "_id".to_string()
            } else {
                name.to_string()
            }
        });
    let required = member_modifiers.contains(&"required")
        || has("Required")
        || has("BsonRequired")
        || is_id;
    FieldDefinition {
        name: name.to_string(),
        element_name,
        field_type,
        is_collection: element_type.is_some(),
        element_type,
        nullable,
        required,
        is_id,
        attributes,
        default_value,
    }
}

fn is_mapped(attrs: &[AttributeConfig]) -> bool {
    attrs.iter().any(|a| a.name == "BsonElement" || a.name == "BsonId")
}

fn ignored(attrs: &[AttributeConfig]) -> bool {
    attrs.iter().any(|a| a.name == "BsonIgnore")
}

/// Data members of a type body plus positional record parameters.
///
/// Handle-typed members are skipped; `is_handle` decides what counts as one.
pub fn data_members(
    type_node: Node,
    body: Option<Node>,
    is_record: bool,
    context: NullabilityContext,
    source: &[u8],
    is_handle: &dyn Fn(&str) -> bool,
) -> Vec<FieldDefinition> {
    let mut fields = Vec::new();

    if is_record {
        if let Some(params) = named_children(type_node)
            .into_iter()
            .find(|c| c.kind() == "parameter_list")
        {
            for param in named_children(params) {
                let (Some(name), Some(ty)) = (
                    field_text(param, "name", source),
                    field_text(param, "type", source),
                ) else {
                    continue;
                };
                let name_end = param
                    .child_by_field_name("name")
                    .map_or(usize::MAX, |n| n.end_byte());
                let default = named_children(param)
                    .into_iter()
                    .find(|c| c.start_byte() >= name_end)
                    .map(|d| default_text(d, source));
                fields.push(build_field(
                    name,
                    ty,
                    &[],
                    attributes(param, source),
                    default,
                    context,
                ));
            }
        }
    }

    let Some(body) = body else {
        return fields;
    };
    for member in named_children(body) {
        match member.kind() {
            "property_declaration" => {
                let mods = modifiers(member, source);
                let attrs = attributes(member, source);
                if mods.contains(&"static") || ignored(&attrs) {
                    continue;
                }
                if !mods.contains(&"public") && !is_mapped(&attrs) {
                    continue;
                }
                let (Some(name), Some(ty)) = (
                    field_text(member, "name", source),
                    field_text(member, "type", source),
                ) else {
                    continue;
                };
                if is_handle(ty) {
                    continue;
                }
                let value = member.child_by_field_name("value");
                if value.is_some_and(|v| v.kind() == "arrow_expression_clause") && !is_mapped(&attrs)
                {
                    // Computed property, not stored.
                    continue;
                }
                let default = value
                    .filter(|v| v.kind() != "arrow_expression_clause")
                    .map(|v| default_text(v, source));
                fields.push(build_field(name, ty, &mods, attrs, default, context));
            }
            "field_declaration" => {
                let mods = modifiers(member, source);
                let attrs = attributes(member, source);
                if mods.contains(&"static") || mods.contains(&"const") || ignored(&attrs) {
                    continue;
                }
                if !mods.contains(&"public") && !is_mapped(&attrs) {
                    continue;
                }
                let Some(decl) = named_children(member)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declaration")
                else {
                    continue;
                };
                let Some(ty) = field_text(decl, "type", source) else {
                    continue;
                };
                if is_handle(ty) {
                    continue;
                }
                for declarator in named_children(decl)
                    .into_iter()
                    .filter(|c| c.kind() == "variable_declarator")
                {
                    let Some(name) = declarator_name(declarator, source) else {
                        continue;
                    };
                    let default = declarator_initializer(declarator).map(|v| default_text(v, source));
                    fields.push(build_field(name, ty, &mods, attrs.clone(), default, context));
                }
            }
            _ => {}
        }
    }
    fields
}

fn default_text(node: Node, source: &[u8]) -> String {
    let node = if node.kind() == "equals_value_clause" {
        named_children(node).into_iter().next().unwrap_or(node)
    } else {
        node
    };
    lower_expr(node, source).render()
}

pub fn declarator_name<'a>(declarator: Node, source: &'a [u8]) -> Option<&'a str> {
    field_text(declarator, "name", source).or_else(|| {
        named_children(declarator)
            .into_iter()
            .find(|c| c.kind() == "identifier")
            .map(|c| text(c, source))
    })
}

/// Initializer expression of a `variable_declarator`, across grammar
/// versions (`= expr` directly or wrapped in `equals_value_clause`).
pub fn declarator_initializer(declarator: Node) -> Option<Node> {
    let mut parts = named_children(declarator)
        .into_iter()
        .filter(|c| !matches!(c.kind(), "bracketed_argument_list" | "tuple_pattern"));
    let candidate = match declarator.child_by_field_name("name") {
        Some(name) => parts.find(|c| *c != name)?,
        None => {
            parts.next()?;
            parts.next()?
        }
    };
    if candidate.kind() == "equals_value_clause" {
        named_children(candidate).into_iter().next()
    } else {
        Some(candidate)
    }
}
