//! Repository-wide symbol table built from every file's declarations.

use docscope_core::types::FxHashMap;

use super::SemanticModel;
use crate::source::{FileAnalysis, SiteScope, SymbolDecl};

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<SymbolDecl>,
    /// Qualified container -> member name -> index.
    by_container: FxHashMap<String, FxHashMap<String, usize>>,
    /// Member name -> indices, for unqualified cross-type lookups.
    by_name: FxHashMap<String, Vec<usize>>,
}

impl SymbolTable {
    pub fn from_analyses<'a>(analyses: impl IntoIterator<Item = &'a FileAnalysis>) -> Self {
        let mut table = Self::default();
        for analysis in analyses {
            for symbol in &analysis.symbols {
                table.insert(symbol.clone());
            }
        }
        table
    }

    pub fn insert(&mut self, symbol: SymbolDecl) {
        let index = self.symbols.len();
        // First declaration wins on duplicates (partial classes, locals).
        let slot = self
            .by_container
            .entry(symbol.container.clone())
            .or_default();
        if slot.contains_key(&symbol.name) {
            return;
        }
        slot.insert(symbol.name.clone(), index);
        self.by_name.entry(symbol.name.clone()).or_default().push(index);
        self.symbols.push(symbol);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn in_container(&self, container: &str, name: &str) -> Option<&SymbolDecl> {
        self.by_container
            .get(container)
            .and_then(|members| members.get(name))
            .map(|&i| &self.symbols[i])
    }

    /// Containers matching a written qualifier (`Constants`, `Data.Constants`),
    /// those in or under the caller's namespace first.
    fn containers_for(&self, qualifier: &str, scope: &SiteScope) -> Vec<&str> {
        let suffix = format!(".{qualifier}");
        let mut matches: Vec<&str> = self
            .by_container
            .keys()
            .map(String::as_str)
            .filter(|c| *c == qualifier || c.ends_with(&suffix))
            .collect();
        let namespace = scope.namespace.as_deref().unwrap_or("");
        matches.sort_by_key(|c| {
            let shared = c
                .split('.')
                .zip(namespace.split('.'))
                .take_while(|(a, b)| !b.is_empty() && a == b)
                .count();
            (std::cmp::Reverse(shared), c.len(), c.to_string())
        });
        matches
    }

    fn unqualified(&self, name: &str, scope: &SiteScope) -> Option<&SymbolDecl> {
        // Enclosing type, then its outer types.
        let mut container = scope.enclosing_type.as_deref();
        while let Some(current) = container {
            if let Some(symbol) = self.in_container(current, name) {
                return Some(symbol);
            }
            container = current.rsplit_once('.').map(|(outer, _)| outer);
        }
        match self.by_name.get(name).map(Vec::as_slice) {
            Some([only]) => Some(&self.symbols[*only]),
            _ => None,
        }
    }
}

impl SemanticModel for SymbolTable {
    fn resolve_symbol(&self, path: &[&str], scope: &SiteScope) -> Option<&SymbolDecl> {
        let path = match path {
            ["this", rest @ ..] => rest,
            _ => path,
        };
        match path {
            [] => None,
            [name] => self.unqualified(name, scope),
            [qualifier @ .., name] => {
                let qualifier = qualifier.join(".");
                self.containers_for(&qualifier, scope)
                    .into_iter()
                    .find_map(|c| self.in_container(c, name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SymbolKind;
    use crate::syntax::Expr;

    fn symbol(container: &str, name: &str, value: &str) -> SymbolDecl {
        SymbolDecl {
            container: container.into(),
            name: name.into(),
            kind: SymbolKind::Const,
            declared_type: "string".into(),
            initializer: Some(Expr::StringLiteral(value.into())),
            line: 1,
        }
    }

    fn scope(ns: &str, ty: &str) -> SiteScope {
        SiteScope {
            namespace: Some(ns.into()),
            enclosing_type: Some(format!("{ns}.{ty}")),
            enclosing_member: None,
        }
    }

    fn value(decl: Option<&SymbolDecl>) -> Option<&str> {
        decl.and_then(|d| d.initializer.as_ref())
            .and_then(Expr::as_str_literal)
    }

    #[test]
    fn unqualified_prefers_enclosing_type() {
        let mut table = SymbolTable::default();
        table.insert(symbol("Shop.Data.OrderRepo", "Name", "orders"));
        table.insert(symbol("Shop.Data.UserRepo", "Name", "users"));
        let s = scope("Shop.Data", "UserRepo");
        assert_eq!(value(table.resolve_symbol(&["Name"], &s)), Some("users"));
        assert_eq!(value(table.resolve_symbol(&["this", "Name"], &s)), Some("users"));
    }

    #[test]
    fn unqualified_falls_back_to_unique_global() {
        let mut table = SymbolTable::default();
        table.insert(symbol("Shop.Constants", "Vendors", "vendors"));
        let s = scope("Shop.Data", "VendorRepo");
        assert_eq!(value(table.resolve_symbol(&["Vendors"], &s)), Some("vendors"));
        table.insert(symbol("Other.Constants", "Vendors", "suppliers"));
        assert_eq!(table.resolve_symbol(&["Vendors"], &s), None);
    }

    #[test]
    fn qualified_prefers_callers_namespace() {
        let mut table = SymbolTable::default();
        table.insert(symbol("Legacy.Constants", "Orders", "orders_v1"));
        table.insert(symbol("Shop.Constants", "Orders", "orders"));
        let s = scope("Shop.Data", "OrderRepo");
        assert_eq!(
            value(table.resolve_symbol(&["Constants", "Orders"], &s)),
            Some("orders")
        );
        assert_eq!(
            value(table.resolve_symbol(&["Legacy", "Constants", "Orders"], &s)),
            Some("orders_v1")
        );
    }

    #[test]
    fn nested_type_sees_outer_constants() {
        let mut table = SymbolTable::default();
        table.insert(symbol("Shop.Db", "Prefix", "shop_"));
        let s = scope("Shop", "Db.Collections");
        assert_eq!(value(table.resolve_symbol(&["Prefix"], &s)), Some("shop_"));
    }
}
