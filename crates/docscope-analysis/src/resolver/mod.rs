//! Collection resolution: type + call site -> collection name with a
//! resolution method and confidence.

pub mod evaluator;
pub mod markers;

use std::sync::Arc;

use docscope_core::config::ResolutionConfig;
use docscope_core::model::{
    CodeType, CollectionMapping, EntityId, EntityRef, EntityType, ResolutionMethod, SourceRevision,
};
use docscope_core::types::FxHashMap;

pub use evaluator::{Evaluator, Resolution, INFERRED_CONFIDENCE};
pub use markers::{AccessorKind, AccessorMarkers};

use crate::semantic::{SemanticModel, TypeIndex};
use crate::source::{CallSiteSource, FileAnalysis};

/// Mappings of one repository plus the index operations use to find the
/// mapping behind a call site.
#[derive(Debug, Default)]
pub struct ResolvedMappings {
    pub mappings: Vec<CollectionMapping>,
    pub(crate) by_site: FxHashMap<(String, usize), usize>,
}

impl ResolvedMappings {
    /// Mapping produced for call site `ordinal` of `file`.
    pub fn for_site(&self, file: &str, ordinal: usize) -> Option<&CollectionMapping> {
        self.by_site
            .get(&(file.to_string(), ordinal))
            .map(|&i| &self.mappings[i])
    }

    /// The primary mapping of a code type, falling back to its best mapping.
    pub fn primary_for_type(&self, type_id: &EntityId) -> Option<&CollectionMapping> {
        let of_type = || {
            self.mappings
                .iter()
                .filter(move |m| m.code_type.as_ref().is_some_and(|r| &r.id == type_id))
        };
        of_type()
            .find(|m| m.is_primary)
            .or_else(|| of_type().next())
    }

    /// Mappings whose resolved collection name is `name`, primary ones first.
    pub fn for_collection<'s: 'n, 'n>(
        &'s self,
        name: &'n str,
    ) -> impl Iterator<Item = &'s CollectionMapping> + 'n {
        let named = self
            .mappings
            .iter()
            .filter(move |m| m.collection_name.as_deref() == Some(name));
        named
            .clone()
            .filter(|m| m.is_primary)
            .chain(named.filter(|m| !m.is_primary))
    }

    /// Mapping whose resolved collection name is `name`, primary first.
    pub fn by_collection(&self, name: &str) -> Option<&CollectionMapping> {
        self.for_collection(name).next()
    }
}

pub struct CollectionResolver {
    markers: AccessorMarkers,
    max_depth: usize,
    suffixes: Vec<String>,
}

impl CollectionResolver {
    pub fn new(config: &ResolutionConfig) -> Self {
        Self {
            markers: AccessorMarkers::new(config),
            max_depth: config.effective_max_depth(),
            suffixes: config.effective_poco_suffixes(),
        }
    }

    /// Resolve every call site of the corpus, then add inferred mappings for
    /// types no call site resolved, then pick primaries.
    pub fn resolve(
        &self,
        analyses: &[Arc<FileAnalysis>],
        types: &[CodeType],
        symbols: &dyn SemanticModel,
        revision: &SourceRevision,
    ) -> ResolvedMappings {
        let evaluator = Evaluator::new(symbols, &self.markers, self.max_depth);
        let index = TypeIndex::new(types);
        let mut out = ResolvedMappings::default();

        for analysis in analyses {
            for site in &analysis.call_sites {
                let code_type = match site.source {
                    CallSiteSource::Attribute => site
                        .scope
                        .enclosing_type
                        .as_deref()
                        .and_then(|t| index.lookup(t, site.scope.namespace.as_deref(), &[])),
                    CallSiteSource::Invocation => index.lookup(
                        &site.type_argument,
                        site.scope.namespace.as_deref(),
                        &analysis.usings,
                    ),
                };
                let resolution = evaluator.evaluate(&site.argument, &site.scope);
                let type_name = code_type
                    .map(CodeType::full_name)
                    .unwrap_or_else(|| site.type_argument.clone());
                let symbol = match site.source {
                    CallSiteSource::Attribute => type_name.clone(),
                    CallSiteSource::Invocation => site.scope.symbol(),
                };
                tracing::trace!(
                    file = %analysis.file_path,
                    type_name = %type_name,
                    method = %resolution.method,
                    "resolved call site"
                );
                out.by_site
                    .insert((analysis.file_path.clone(), site.ordinal), out.mappings.len());
                out.mappings.push(CollectionMapping {
                    id: EntityId::derive(
                        EntityType::CollectionMapping,
                        &revision.repository,
                        &analysis.file_path,
                        &type_name,
                        &format!("site#{}", site.ordinal),
                    ),
                    code_type: code_type
                        .map(|t| EntityRef::new(EntityType::CodeType, t.id.clone())),
                    type_name,
                    collection_name: resolution.value,
                    method: resolution.method,
                    confidence: resolution.confidence.clamp(0.0, 1.0),
                    context: resolution.context,
                    is_primary: false,
                    provenance: revision.provenance(&analysis.file_path, &symbol, site.line_span),
                });
            }
        }

        for ty in types {
            let resolved = out.mappings.iter().any(|m| {
                m.collection_name.is_some() && m.code_type.as_ref().is_some_and(|r| r.id == ty.id)
            });
            if !resolved {
                out.mappings.push(self.inferred_mapping(ty, revision));
            }
        }

        mark_primaries(&mut out.mappings);
        out
    }

    fn inferred_mapping(&self, ty: &CodeType, revision: &SourceRevision) -> CollectionMapping {
        let simple = ty.name.rsplit('.').next().unwrap_or(&ty.name);
        let name = infer_collection_name(simple, &self.suffixes);
        let full_name = ty.full_name();
        CollectionMapping {
            id: EntityId::derive(
                EntityType::CollectionMapping,
                &revision.repository,
                &ty.provenance.file_path,
                &full_name,
                "inferred",
            ),
            code_type: Some(EntityRef::new(EntityType::CodeType, ty.id.clone())),
            context: format!("inferred from type name {simple}"),
            type_name: full_name,
            collection_name: Some(name),
            method: ResolutionMethod::Inferred,
            confidence: INFERRED_CONFIDENCE,
            is_primary: false,
            provenance: ty.provenance.clone(),
        }
    }
}

/// `OrderEntity` -> `orders`, `Customer` -> `customers`.
pub fn infer_collection_name(type_name: &str, suffixes: &[String]) -> String {
    let stem = suffixes
        .iter()
        .filter_map(|s| type_name.strip_suffix(s.as_str()))
        .find(|stem| !stem.is_empty())
        .unwrap_or(type_name);
    let mut chars = stem.chars();
    let mut name = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    name.push('s');
    name
}

/// Among resolved, non-inferred mappings of one key, the most confident
/// (first on ties) is primary. Typed mappings key on the code type; untyped
/// ones on (type name, collection name).
fn mark_primaries(mappings: &mut [CollectionMapping]) {
    let mut best: FxHashMap<String, usize> = FxHashMap::default();
    for (i, m) in mappings.iter().enumerate() {
        if m.collection_name.is_none() || m.method == ResolutionMethod::Inferred {
            continue;
        }
        let key = match &m.code_type {
            Some(r) => r.id.as_str().to_string(),
            None => format!(
                "{}|{}",
                m.type_name,
                m.collection_name.as_deref().unwrap_or_default()
            ),
        };
        match best.get(&key) {
            Some(&j) if mappings[j].confidence >= m.confidence => {}
            _ => {
                best.insert(key, i);
            }
        }
    }
    for i in best.into_values() {
        mappings[i].is_primary = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferred_names_strip_known_suffixes() {
        let suffixes: Vec<String> = ["Entity", "Model", "Document", "Record"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(infer_collection_name("OrderEntity", &suffixes), "orders");
        assert_eq!(infer_collection_name("Customer", &suffixes), "customers");
        assert_eq!(infer_collection_name("AuditRecord", &suffixes), "audits");
        assert_eq!(infer_collection_name("Model", &suffixes), "models");
    }
}
