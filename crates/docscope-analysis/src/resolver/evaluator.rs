//! Collection-name expression evaluator.
//!
//! A recursive function over [`Expr`]; each variant has its own handler
//! returning a [`Resolution`]. Nothing here executes code: only literals,
//! constants, read-only initializers, concatenation, interpolation, `nameof`,
//! `??` fallbacks and case transforms are followed.

use docscope_core::model::ResolutionMethod;

use super::markers::{AccessorKind, AccessorMarkers};
use crate::semantic::SemanticModel;
use crate::source::{SiteScope, SymbolKind};
use crate::syntax::{Argument, Expr};

pub const LITERAL_CONFIDENCE: f64 = 1.0;
pub const CONSTANT_CONFIDENCE: f64 = 0.9;
pub const READONLY_CONFIDENCE: f64 = 0.7;
pub const CONFIG_CONFIDENCE: f64 = 0.6;
pub const ENVIRONMENT_CONFIDENCE: f64 = 0.5;
pub const INFERRED_CONFIDENCE: f64 = 0.3;
pub const UNKNOWN_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Option<String>,
    pub method: ResolutionMethod,
    pub confidence: f64,
    pub context: String,
}

impl Resolution {
    fn literal(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            method: ResolutionMethod::Literal,
            confidence: LITERAL_CONFIDENCE,
            context: "string literal".to_string(),
        }
    }

    fn unknown(context: impl Into<String>) -> Self {
        Self {
            value: None,
            method: ResolutionMethod::Unknown,
            confidence: UNKNOWN_CONFIDENCE,
            context: context.into(),
        }
    }

    fn is_static(&self) -> bool {
        self.value.is_some() && self.method.is_static()
    }

    fn is_accessor(&self) -> bool {
        matches!(
            self.method,
            ResolutionMethod::Config | ResolutionMethod::Environment
        )
    }
}

pub struct Evaluator<'a> {
    symbols: &'a dyn SemanticModel,
    markers: &'a AccessorMarkers,
    max_depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(symbols: &'a dyn SemanticModel, markers: &'a AccessorMarkers, max_depth: usize) -> Self {
        Self {
            symbols,
            markers,
            max_depth,
        }
    }

    pub fn evaluate(&self, expr: &Expr, scope: &SiteScope) -> Resolution {
        self.eval(expr, scope, 0)
    }

    fn eval(&self, expr: &Expr, scope: &SiteScope, depth: usize) -> Resolution {
        if depth > self.max_depth {
            return Resolution::unknown(format!("indirection deeper than {}", self.max_depth));
        }
        match expr {
            Expr::StringLiteral(s) => Resolution::literal(s),
            Expr::Interpolated(parts) => self.eval_interpolated(parts, scope, depth),
            Expr::Identifier(_) | Expr::MemberAccess { .. } => self.eval_path(expr, scope, depth),
            Expr::Invocation { callee, args, .. } => self.eval_invocation(expr, callee, args, scope, depth),
            Expr::ElementAccess { .. } => self.eval_accessor(expr),
            Expr::Binary { left, op, right } if op == "+" => {
                self.eval_concat(expr, left, right, scope, depth)
            }
            Expr::Binary { left, op, right } if op == "??" => {
                self.eval_fallback(left, right, scope, depth)
            }
            _ => self.eval_accessor(expr),
        }
    }

    /// Configuration or environment accessor, else unknown.
    fn eval_accessor(&self, expr: &Expr) -> Resolution {
        let rendered = expr.render();
        let key = accessor_key(expr);
        let describe = |what: &str| match &key {
            Some(key) => format!("{what} {rendered} (key {key})"),
            None => format!("{what} {rendered}"),
        };
        match self.markers.classify(&rendered) {
            Some(AccessorKind::Environment) => Resolution {
                value: None,
                method: ResolutionMethod::Environment,
                confidence: ENVIRONMENT_CONFIDENCE,
                context: describe("environment variable"),
            },
            Some(AccessorKind::Config) => Resolution {
                value: None,
                method: ResolutionMethod::Config,
                confidence: CONFIG_CONFIDENCE,
                context: describe("configuration accessor"),
            },
            None => Resolution::unknown(format!("unresolved expression {rendered}")),
        }
    }

    fn eval_path(&self, expr: &Expr, scope: &SiteScope, depth: usize) -> Resolution {
        let Some(path) = expr.path() else {
            return self.eval_accessor(expr);
        };
        let Some(symbol) = self.symbols.resolve_symbol(&path, scope) else {
            return self.eval_accessor(expr);
        };
        let Some(initializer) = &symbol.initializer else {
            return self.eval_accessor(expr);
        };
        let symbol_scope = SiteScope {
            namespace: symbol
                .container
                .rsplit_once('.')
                .map(|(ns, _)| ns.to_string()),
            enclosing_type: Some(symbol.container.clone()),
            enclosing_member: None,
        };
        let inner = self.eval(initializer, &symbol_scope, depth + 1);
        let qualified = format!("{}.{}", symbol.container, symbol.name);
        if inner.is_static() {
            let (ceiling, what) = match symbol.kind {
                SymbolKind::Const => (CONSTANT_CONFIDENCE, "constant"),
                SymbolKind::StaticReadonly | SymbolKind::Readonly => {
                    (READONLY_CONFIDENCE, "read-only field")
                }
            };
            return Resolution {
                value: inner.value,
                method: ResolutionMethod::Constant,
                confidence: ceiling.min(inner.confidence),
                context: format!("{what} {qualified}"),
            };
        }
        if inner.is_accessor() {
            return Resolution {
                context: format!("{} via {qualified}", inner.context),
                ..inner
            };
        }
        inner
    }

    fn eval_invocation(
        &self,
        expr: &Expr,
        callee: &Expr,
        args: &[Argument],
        scope: &SiteScope,
        depth: usize,
    ) -> Resolution {
        let name = callee.last_name().unwrap_or("");
        match name {
            "nameof" => {
                let Some(target) = args.first().and_then(|a| a.value.last_name()) else {
                    return self.eval_accessor(expr);
                };
                Resolution {
                    value: Some(target.to_string()),
                    method: ResolutionMethod::Constant,
                    confidence: CONSTANT_CONFIDENCE,
                    context: format!("nameof({target})"),
                }
            }
            "ToLower" | "ToLowerInvariant" | "ToUpper" | "ToUpperInvariant" | "Trim"
                if args.is_empty() =>
            {
                let Some(receiver) = callee.receiver() else {
                    return self.eval_accessor(expr);
                };
                let mut inner = self.eval(receiver, scope, depth + 1);
                inner.value = inner.value.map(|v| match name {
                    "ToLower" | "ToLowerInvariant" => v.to_lowercase(),
                    "ToUpper" | "ToUpperInvariant" => v.to_uppercase(),
                    _ => v.trim().to_string(),
                });
                inner
            }
            "Concat" if callee.receiver().is_some_and(|r| {
                matches!(r.last_name(), Some("string" | "String"))
            }) =>
            {
                let parts: Vec<Expr> = args.iter().map(|a| a.value.clone()).collect();
                self.eval_interpolated(&parts, scope, depth)
            }
            _ => self.eval_accessor(expr),
        }
    }

    fn eval_concat(
        &self,
        expr: &Expr,
        left: &Expr,
        right: &Expr,
        scope: &SiteScope,
        depth: usize,
    ) -> Resolution {
        let l = self.eval(left, scope, depth + 1);
        let r = self.eval(right, scope, depth + 1);
        combine(vec![l, r]).unwrap_or_else(|| self.eval_accessor(expr))
    }

    fn eval_interpolated(&self, parts: &[Expr], scope: &SiteScope, depth: usize) -> Resolution {
        let resolved = parts.iter().map(|p| self.eval(p, scope, depth + 1)).collect();
        combine(resolved).unwrap_or_else(|| Resolution::unknown("unresolved interpolation"))
    }

    /// `primary ?? "fallback"`: an accessor keeps its method and confidence,
    /// the fallback literal becomes the value.
    fn eval_fallback(&self, left: &Expr, right: &Expr, scope: &SiteScope, depth: usize) -> Resolution {
        let primary = self.eval(left, scope, depth + 1);
        if primary.value.is_some() {
            return primary;
        }
        let fallback = self.eval(right, scope, depth + 1);
        if primary.is_accessor() {
            if let Some(value) = fallback.value {
                return Resolution {
                    context: format!("{} with fallback \"{value}\"", primary.context),
                    value: Some(value),
                    ..primary
                };
            }
            return primary;
        }
        fallback
    }
}

/// Concatenate resolved parts. The result takes the method and confidence of
/// the weakest part. `None` when any part has no value and none is an
/// accessor.
fn combine(parts: Vec<Resolution>) -> Option<Resolution> {
    if parts.is_empty() {
        return None;
    }
    let weakest = parts
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            a.confidence
                .total_cmp(&b.confidence)
                .then_with(|| ia.cmp(ib))
        })
        .map(|(i, _)| i)?;
    if parts.iter().all(|p| p.value.is_some()) {
        let value: String = parts.iter().filter_map(|p| p.value.as_deref()).collect();
        let weakest = &parts[weakest];
        return Some(Resolution {
            value: Some(value),
            method: weakest.method,
            confidence: weakest.confidence,
            context: format!("concatenation ({})", weakest.context),
        });
    }
    parts
        .into_iter()
        .filter(|p| p.value.is_none() && p.is_accessor())
        .min_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map(|p| Resolution {
            context: format!("concatenation with {}", p.context),
            ..p
        })
}

/// Literal key of a configuration lookup: `config["Mongo:Orders"]`,
/// `GetValue<string>("Orders")`, `GetEnvironmentVariable("ORDERS")`.
fn accessor_key(expr: &Expr) -> Option<String> {
    match expr {
        Expr::ElementAccess { index, .. } => index.as_str_literal().map(str::to_string),
        Expr::Invocation { args, .. } => args
            .first()
            .and_then(|a| a.value.as_str_literal())
            .map(str::to_string),
        Expr::MemberAccess { object, .. } => accessor_key(object),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::SymbolTable;
    use crate::source::SymbolDecl;

    fn table() -> SymbolTable {
        let mut t = SymbolTable::default();
        let mut add = |container: &str, name: &str, kind, init: Expr| {
            t.insert(SymbolDecl {
                container: container.into(),
                name: name.into(),
                kind,
                declared_type: "string".into(),
                initializer: Some(init),
                line: 1,
            })
        };
        add("Shop.Constants", "Vendors", SymbolKind::Const, Expr::StringLiteral("vendors".into()));
        add("Shop.Constants", "Prefix", SymbolKind::Const, Expr::StringLiteral("shop_".into()));
        add(
            "Shop.Data.Repo",
            "_name",
            SymbolKind::Readonly,
            Expr::StringLiteral("repo_items".into()),
        );
        add(
            "Shop.Data.Repo",
            "Aliased",
            SymbolKind::Const,
            Expr::MemberAccess {
                object: Box::new(Expr::Identifier("Constants".into())),
                name: "Vendors".into(),
            },
        );
        add(
            "Shop.Data.Repo",
            "FromEnv",
            SymbolKind::StaticReadonly,
            Expr::Invocation {
                callee: Box::new(Expr::MemberAccess {
                    object: Box::new(Expr::Identifier("Environment".into())),
                    name: "GetEnvironmentVariable".into(),
                }),
                type_args: vec![],
                args: vec![Argument {
                    name: None,
                    value: Expr::StringLiteral("ORDERS".into()),
                }],
            },
        );
        t
    }

    fn scope() -> SiteScope {
        SiteScope {
            namespace: Some("Shop.Data".into()),
            enclosing_type: Some("Shop.Data.Repo".into()),
            enclosing_member: Some("ctor".into()),
        }
    }

    fn eval(expr: Expr) -> Resolution {
        let t = table();
        let markers = AccessorMarkers::default();
        Evaluator::new(&t, &markers, 8).evaluate(&expr, &scope())
    }

    fn member(object: &str, name: &str) -> Expr {
        Expr::MemberAccess {
            object: Box::new(Expr::Identifier(object.into())),
            name: name.into(),
        }
    }

    #[test]
    fn literal_is_exact() {
        let r = eval(Expr::StringLiteral("vendors".into()));
        assert_eq!(r.value.as_deref(), Some("vendors"));
        assert_eq!(r.method, ResolutionMethod::Literal);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn constant_member_access() {
        let r = eval(member("Constants", "Vendors"));
        assert_eq!(r.value.as_deref(), Some("vendors"));
        assert_eq!(r.method, ResolutionMethod::Constant);
        assert_eq!(r.confidence, 0.9);
    }

    #[test]
    fn constant_chain_stays_constant() {
        let r = eval(Expr::Identifier("Aliased".into()));
        assert_eq!(r.value.as_deref(), Some("vendors"));
        assert_eq!(r.confidence, 0.9);
    }

    #[test]
    fn readonly_field_is_weaker_constant() {
        let r = eval(member("this", "_name"));
        assert_eq!(r.value.as_deref(), Some("repo_items"));
        assert_eq!(r.method, ResolutionMethod::Constant);
        assert_eq!(r.confidence, 0.7);
    }

    #[test]
    fn concatenation_takes_weaker_operand() {
        let r = eval(Expr::Binary {
            left: Box::new(member("Constants", "Prefix")),
            op: "+".into(),
            right: Box::new(Expr::StringLiteral("orders".into())),
        });
        assert_eq!(r.value.as_deref(), Some("shop_orders"));
        assert_eq!(r.method, ResolutionMethod::Constant);
        assert_eq!(r.confidence, 0.9);
    }

    #[test]
    fn interpolation_concatenates() {
        let r = eval(Expr::Interpolated(vec![
            Expr::Identifier("Prefix".into()),
            Expr::StringLiteral("audit".into()),
        ]));
        assert_eq!(r.value.as_deref(), Some("shop_audit"));
    }

    #[test]
    fn config_accessor_is_unresolved() {
        let r = eval(Expr::ElementAccess {
            object: Box::new(Expr::Identifier("_configuration".into())),
            index: Box::new(Expr::StringLiteral("Mongo:Orders".into())),
        });
        assert_eq!(r.value, None);
        assert_eq!(r.method, ResolutionMethod::Config);
        assert_eq!(r.confidence, 0.6);
        assert!(r.context.contains("Mongo:Orders"));
    }

    #[test]
    fn environment_through_static_readonly() {
        let r = eval(Expr::Identifier("FromEnv".into()));
        assert_eq!(r.method, ResolutionMethod::Environment);
        assert_eq!(r.confidence, 0.5);
        assert!(r.context.contains("ORDERS"));
    }

    #[test]
    fn fallback_keeps_accessor_method() {
        let r = eval(Expr::Binary {
            left: Box::new(Expr::Identifier("FromEnv".into())),
            op: "??".into(),
            right: Box::new(Expr::StringLiteral("orders".into())),
        });
        assert_eq!(r.value.as_deref(), Some("orders"));
        assert_eq!(r.method, ResolutionMethod::Environment);
        assert_eq!(r.confidence, 0.5);
    }

    #[test]
    fn nameof_is_constant() {
        let r = eval(Expr::Invocation {
            callee: Box::new(Expr::Identifier("nameof".into())),
            type_args: vec![],
            args: vec![Argument {
                name: None,
                value: Expr::Identifier("Invoices".into()),
            }],
        });
        assert_eq!(r.value.as_deref(), Some("Invoices"));
        assert_eq!(r.method, ResolutionMethod::Constant);
    }

    #[test]
    fn lowercase_transform_applies_to_value() {
        let r = eval(Expr::Invocation {
            callee: Box::new(Expr::MemberAccess {
                object: Box::new(Expr::Invocation {
                    callee: Box::new(Expr::Identifier("nameof".into())),
                    type_args: vec![],
                    args: vec![Argument {
                        name: None,
                        value: Expr::Identifier("Invoices".into()),
                    }],
                }),
                name: "ToLowerInvariant".into(),
            }),
            type_args: vec![],
            args: vec![],
        });
        assert_eq!(r.value.as_deref(), Some("invoices"));
    }

    #[test]
    fn unknown_identifier() {
        let r = eval(Expr::Identifier("collectionName".into()));
        assert_eq!(r.value, None);
        assert_eq!(r.method, ResolutionMethod::Unknown);
        assert_eq!(r.confidence, 0.1);
    }

    #[test]
    fn self_reference_stops_at_depth() {
        let mut t = SymbolTable::default();
        t.insert(SymbolDecl {
            container: "Loop".into(),
            name: "A".into(),
            kind: SymbolKind::Const,
            declared_type: "string".into(),
            initializer: Some(Expr::Identifier("A".into())),
            line: 1,
        });
        let markers = AccessorMarkers::default();
        let s = SiteScope {
            namespace: None,
            enclosing_type: Some("Loop".into()),
            enclosing_member: None,
        };
        let r = Evaluator::new(&t, &markers, 4).evaluate(&Expr::Identifier("A".into()), &s);
        assert_eq!(r.method, ResolutionMethod::Unknown);
    }
}
