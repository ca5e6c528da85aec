//! Lookup of POCO code types by the name a call site wrote.

use docscope_core::model::CodeType;
use docscope_core::types::FxHashMap;

use crate::syntax::node::simple_type_name;

/// Index over a repository's code types, by simple and full name.
pub struct TypeIndex<'a> {
    types: &'a [CodeType],
    by_simple: FxHashMap<&'a str, Vec<usize>>,
    by_full: FxHashMap<String, usize>,
}

impl<'a> TypeIndex<'a> {
    pub fn new(types: &'a [CodeType]) -> Self {
        let mut by_simple: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        let mut by_full = FxHashMap::default();
        for (i, ty) in types.iter().enumerate() {
            let simple = ty.name.rsplit('.').next().unwrap_or(&ty.name);
            by_simple.entry(simple).or_default().push(i);
            by_full.entry(ty.full_name()).or_insert(i);
        }
        Self {
            types,
            by_simple,
            by_full,
        }
    }

    pub fn types(&self) -> &'a [CodeType] {
        self.types
    }

    /// Resolve a written type name. Ambiguous simple names prefer the
    /// caller's namespace, then its `using` imports, then the first declared.
    pub fn lookup(&self, written: &str, namespace: Option<&str>, usings: &[String]) -> Option<&'a CodeType> {
        let written = written.trim().trim_end_matches('?');
        if let Some(&i) = self.by_full.get(written) {
            return Some(&self.types[i]);
        }
        let candidates = self.by_simple.get(simple_type_name(written))?;
        let pick = |pred: &dyn Fn(&CodeType) -> bool| {
            candidates
                .iter()
                .map(|&i| &self.types[i])
                .find(|ty| pred(*ty))
        };
        if candidates.len() == 1 {
            return Some(&self.types[candidates[0]]);
        }
        pick(&|ty| ty.namespace.as_deref() == namespace)
            .or_else(|| pick(&|ty| ty.namespace.as_ref().is_some_and(|ns| usings.contains(ns))))
            .or_else(|| candidates.first().map(|&i| &self.types[i]))
    }

    /// Lookup by simple name only, for names built from conventions
    /// (`CustomerId` -> `Customer`).
    pub fn by_simple_name(&self, name: &str) -> Option<&'a CodeType> {
        self.by_simple
            .get(name)
            .and_then(|c| c.first())
            .map(|&i| &self.types[i])
    }

    /// Case-insensitive simple-name lookup (`customer_id` -> `Customer`).
    pub fn by_name_ignore_case(&self, name: &str) -> Option<&'a CodeType> {
        self.by_simple
            .iter()
            .filter(|(simple, _)| simple.eq_ignore_ascii_case(name))
            .flat_map(|(_, c)| c.first())
            .map(|&i| &self.types[i])
            .min_by_key(|ty| ty.full_name())
    }
}
