//! The `Expr` tagged union.

use serde::{Deserialize, Serialize};

/// A C# expression reduced to the shapes the extractors understand.
///
/// Anything else is kept as [`Expr::Other`] with its source text, which is
/// still useful for marker matching and for rendering values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    StringLiteral(String),
    /// `$"..."`: literal chunks and interpolated expressions, in order.
    Interpolated(Vec<Expr>),
    Number(String),
    Bool(bool),
    Null,
    Identifier(String),
    MemberAccess {
        object: Box<Expr>,
        name: String,
    },
    ElementAccess {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Invocation {
        callee: Box<Expr>,
        type_args: Vec<String>,
        args: Vec<Argument>,
    },
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    ObjectCreation {
        type_name: String,
        args: Vec<Argument>,
        initializer: Vec<Expr>,
    },
    AnonymousObject(Vec<ObjectMember>),
    /// Array / collection / nested initializer elements.
    Collection(Vec<Expr>),
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    TypeOf(String),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Named-argument label (`filter:`).
    pub name: Option<String>,
    pub value: Expr,
}

/// Member of an anonymous object, `new { x.Name, Total = x.Sum }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMember {
    pub name: Option<String>,
    pub value: Expr,
}

impl ObjectMember {
    /// Explicit name, or the projected member's own name.
    pub fn effective_name(&self) -> Option<&str> {
        self.name.as_deref().or_else(|| self.value.last_name())
    }
}

impl Expr {
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Self::StringLiteral(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n
                .trim_end_matches(['L', 'l', 'u', 'U'])
                .replace('_', "")
                .parse()
                .ok(),
            Self::Unary { op, operand } if op == "-" => operand.as_i64().map(|v| -v),
            _ => None,
        }
    }

    /// Dotted path of an identifier / member-access chain:
    /// `Constants.Collections.Orders` -> `["Constants", "Collections", "Orders"]`.
    pub fn path(&self) -> Option<Vec<&str>> {
        match self {
            Self::Identifier(name) => Some(vec![name.as_str()]),
            Self::MemberAccess { object, name } => {
                let mut path = object.path()?;
                path.push(name);
                Some(path)
            }
            _ => None,
        }
    }

    /// Last identifier of a name, member access or invocation callee.
    pub fn last_name(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            Self::MemberAccess { name, .. } => Some(name),
            Self::Invocation { callee, .. } => callee.last_name(),
            _ => None,
        }
    }

    /// Receiver of a member access or of an invoked member access.
    pub fn receiver(&self) -> Option<&Expr> {
        match self {
            Self::MemberAccess { object, .. } => Some(object),
            Self::Invocation { callee, .. } => callee.receiver(),
            _ => None,
        }
    }

    /// Member path relative to a lambda parameter: `x.Customer.Id` with
    /// parameter `x` -> `Customer.Id`.
    pub fn member_path_from(&self, param: &str) -> Option<String> {
        let path = self.path()?;
        let (root, rest) = path.split_first()?;
        if *root != param || rest.is_empty() {
            return None;
        }
        Some(rest.join("."))
    }

    pub fn args(&self) -> &[Argument] {
        match self {
            Self::Invocation { args, .. } | Self::ObjectCreation { args, .. } => args,
            _ => &[],
        }
    }

    /// Approximate C# rendering, used for stored values and context text.
    pub fn render(&self) -> String {
        match self {
            Self::StringLiteral(s) => format!("\"{s}\""),
            Self::Interpolated(parts) => {
                let mut out = String::from("$\"");
                for part in parts {
                    match part {
                        Self::StringLiteral(s) => out.push_str(s),
                        other => {
                            out.push('{');
                            out.push_str(&other.render());
                            out.push('}');
                        }
                    }
                }
                out.push('"');
                out
            }
            Self::Number(n) => n.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Null => "null".to_string(),
            Self::Identifier(name) => name.clone(),
            Self::MemberAccess { object, name } => format!("{}.{name}", object.render()),
            Self::ElementAccess { object, index } => {
                format!("{}[{}]", object.render(), index.render())
            }
            Self::Invocation {
                callee,
                type_args,
                args,
            } => {
                let generics = if type_args.is_empty() {
                    String::new()
                } else {
                    format!("<{}>", type_args.join(", "))
                };
                format!("{}{generics}({})", callee.render(), render_args(args))
            }
            Self::Binary { left, op, right } => {
                format!("{} {op} {}", left.render(), right.render())
            }
            Self::Unary { op, operand } => format!("{op}{}", operand.render()),
            Self::Lambda { params, body } => {
                let params = match params.as_slice() {
                    [single] => single.clone(),
                    many => format!("({})", many.join(", ")),
                };
                format!("{params} => {}", body.render())
            }
            Self::ObjectCreation {
                type_name,
                args,
                initializer,
            } => {
                let mut out = format!("new {type_name}({})", render_args(args));
                if !initializer.is_empty() {
                    out.push_str(&format!(" {{ {} }}", render_list(initializer)));
                }
                out
            }
            Self::AnonymousObject(members) => {
                let body = members
                    .iter()
                    .map(|m| match &m.name {
                        Some(name) => format!("{name} = {}", m.value.render()),
                        None => m.value.render(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("new {{ {body} }}")
            }
            Self::Collection(items) => format!("{{ {} }}", render_list(items)),
            Self::Assignment { target, value } => {
                format!("{} = {}", target.render(), value.render())
            }
            Self::TypeOf(t) => format!("typeof({t})"),
            Self::Other(text) => text.clone(),
        }
    }
}

fn render_list(items: &[Expr]) -> String {
    items.iter().map(Expr::render).collect::<Vec<_>>().join(", ")
}

fn render_args(args: &[Argument]) -> String {
    args.iter()
        .map(|a| match &a.name {
            Some(name) => format!("{name}: {}", a.value.render()),
            None => a.value.render(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
