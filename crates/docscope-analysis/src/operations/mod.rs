//! Operation extraction: driver call sites -> `QueryOperation` facts.

pub mod bson;
pub mod filters;
pub mod handles;
pub mod kinds;
pub mod pipeline;
pub mod shapes;

use std::sync::Arc;

use docscope_core::model::{
    CodeType, EntityId, EntityRef, EntityType, FieldExpression, OperationKind, QueryOperation,
    SourceRevision,
};

pub use handles::HandleResolver;
pub use kinds::{is_async_method, operation_kind};

use crate::resolver::ResolvedMappings;
use crate::semantic::TypeIndex;
use crate::source::{FileAnalysis, OperationSite};
use crate::syntax::{Argument, Expr};
use filters::{extract_filters, filter_argument};
use pipeline::PipelineReader;
use shapes::{
    extract_options, extract_projections, extract_updates, is_options_argument, mode_name, sort_step,
};

/// Shapes read from one call site before ids and provenance are attached.
#[derive(Debug, Default)]
struct OperationShape {
    filters: Vec<FieldExpression>,
    projections: Vec<FieldExpression>,
    sorts: Vec<FieldExpression>,
    updates: Vec<FieldExpression>,
    limit: Option<i64>,
    skip: Option<i64>,
    pipeline: Option<Vec<docscope_core::model::PipelineStage>>,
    has_session: bool,
}

#[derive(Debug, Default)]
pub struct OperationExtractor;

impl OperationExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(
        &self,
        analyses: &[Arc<FileAnalysis>],
        types: &[CodeType],
        mappings: &ResolvedMappings,
        revision: &SourceRevision,
    ) -> Vec<QueryOperation> {
        let index = TypeIndex::new(types);
        let handles = HandleResolver::new(analyses, mappings, &index);
        let mut out = Vec::new();

        for analysis in analyses {
            for site in &analysis.operations {
                let Some(kind) = operation_kind(&site.method) else {
                    continue;
                };
                let Some(mapping) = handles.resolve(&site.receiver, analysis, &site.scope) else {
                    tracing::debug!(
                        file = %analysis.file_path,
                        method = %site.method,
                        line = site.line_span.start,
                        "operation receiver is not a known collection handle"
                    );
                    continue;
                };
                let lookup = |e: &Expr| {
                    handles
                        .resolve_expr(e, analysis, &site.scope)
                        .and_then(|m| m.collection_name.clone())
                };
                let shape = read_shape(kind, site, &lookup);
                let symbol = site.scope.symbol();
                out.push(QueryOperation {
                    id: EntityId::derive(
                        EntityType::QueryOperation,
                        &revision.repository,
                        &analysis.file_path,
                        &symbol,
                        &format!("{}#{}", site.method, site.ordinal),
                    ),
                    kind,
                    method: site.method.clone(),
                    collection_mapping: EntityRef::new(EntityType::CollectionMapping, mapping.id.clone()),
                    collection_name: mapping.collection_name.clone(),
                    filters: shape.filters,
                    projections: shape.projections,
                    sorts: shape.sorts,
                    updates: shape.updates,
                    limit: shape.limit,
                    skip: shape.skip,
                    pipeline: shape.pipeline,
                    is_transactional: shape.has_session || site.in_transaction_scope,
                    read_preference: modifier(site, "WithReadPreference"),
                    write_concern: modifier(site, "WithWriteConcern"),
                    is_async: is_async_method(&site.method) || site.is_awaited,
                    provenance: revision.provenance(&analysis.file_path, &symbol, site.line_span),
                });
            }
        }
        out
    }
}

fn modifier(site: &OperationSite, method: &str) -> Option<String> {
    site.receiver_modifiers
        .iter()
        .rev()
        .find(|m| m.method == method)
        .and_then(|m| m.args.first())
        .map(|a| mode_name(&a.value))
}

fn is_session(arg: &Argument) -> bool {
    if arg.name.as_deref() == Some("session") {
        return true;
    }
    match &arg.value {
        Expr::Identifier(name) | Expr::MemberAccess { name, .. } => {
            name.to_ascii_lowercase().contains("session")
        }
        _ => false,
    }
}

fn read_shape(kind: OperationKind, site: &OperationSite, collections: pipeline::CollectionLookup) -> OperationShape {
    let locals = site.locals.as_slice();
    let mut shape = OperationShape::default();

    // Session first, options anywhere; the rest are positional payloads.
    let mut payload: Vec<&Argument> = Vec::new();
    for arg in &site.args {
        if is_session(arg) {
            shape.has_session = true;
        } else if arg.name.as_deref() == Some("options") || is_options_argument(&arg.value, locals) {
            let options = extract_options(&arg.value, locals);
            shape.limit = shape.limit.or(options.limit);
            shape.skip = shape.skip.or(options.skip);
            shape.sorts.extend(options.sorts);
            shape.projections.extend(options.projections);
        } else {
            payload.push(arg);
        }
    }
    let positional = |i: usize| payload.get(i).map(|a| &a.value);
    let named = |name: &str| {
        payload
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .map(|a| &a.value)
    };
    let owned: Vec<Argument> = payload.iter().map(|a| (*a).clone()).collect();

    match kind {
        OperationKind::Find
        | OperationKind::Count
        | OperationKind::Delete
        | OperationKind::FindOneAndDelete => {
            if let Some(filter) = filter_argument(&owned) {
                shape.filters = extract_filters(filter, locals);
            }
        }
        OperationKind::Distinct => {
            let filter = named("filter").or_else(|| positional(1));
            if let Some(filter) = filter {
                shape.filters = extract_filters(filter, locals);
            }
            if let Some(field) = named("field").or_else(|| positional(0)) {
                if let Some(path) = filters::field_path(field) {
                    shape.projections.push(FieldExpression::new(path, "distinct", None));
                }
            }
        }
        OperationKind::Update | OperationKind::FindOneAndUpdate => {
            if let Some(filter) = named("filter").or_else(|| positional(0)) {
                shape.filters = extract_filters(filter, locals);
            }
            if let Some(update) = named("update").or_else(|| positional(1)) {
                shape.updates = extract_updates(update, locals);
            }
        }
        OperationKind::Replace | OperationKind::FindOneAndReplace => {
            if let Some(filter) = named("filter").or_else(|| positional(0)) {
                shape.filters = extract_filters(filter, locals);
            }
        }
        OperationKind::Insert => {}
        OperationKind::Aggregate | OperationKind::Watch => {
            let reader = PipelineReader::new(locals, collections);
            let stages = named("pipeline")
                .or_else(|| positional(0))
                .and_then(|p| reader.argument_stages(p))
                .unwrap_or_else(|| reader.fluent_stages(&site.chain));
            if !stages.is_empty() || kind == OperationKind::Aggregate {
                shape.pipeline = Some(stages);
            }
        }
        OperationKind::BulkWrite => {
            if let Some(requests) = positional(0) {
                bulk_models(requests, locals, &mut shape);
            }
        }
    }

    if kind != OperationKind::Aggregate {
        read_chain(site, &mut shape);
    }
    shape
}

/// `new WriteModel<T>[] { new UpdateOneModel<T>(filter, update), .. }`.
fn bulk_models(requests: &Expr, locals: bson::Locals, shape: &mut OperationShape) {
    let models: Vec<&Expr> = match requests {
        Expr::Collection(items) => items.iter().collect(),
        Expr::ObjectCreation { initializer, args, .. } => {
            initializer.iter().chain(args.iter().map(|a| &a.value)).collect()
        }
        Expr::Identifier(name) => match bson::local(locals, name) {
            Some(value) => return bulk_models(value, locals, shape),
            None => return,
        },
        _ => return,
    };
    for model in models {
        let Expr::ObjectCreation { type_name, args, .. } = model else {
            continue;
        };
        let model_kind = type_name.split('<').next().unwrap_or(type_name);
        if model_kind == "InsertOneModel" {
            continue;
        }
        if let Some(filter) = args.first() {
            shape.filters.extend(extract_filters(&filter.value, locals));
        }
        if matches!(model_kind, "UpdateOneModel" | "UpdateManyModel") {
            if let Some(update) = args.get(1) {
                shape.updates.extend(extract_updates(&update.value, locals));
            }
        }
    }
}

/// Fluent chain after the operation: `.Sort(..).Skip(10).Limit(20)`, and
/// LINQ after `AsQueryable()`.
fn read_chain(site: &OperationSite, shape: &mut OperationShape) {
    let locals = site.locals.as_slice();
    for call in &site.chain {
        let first = call.args.first().map(|a| &a.value);
        match call.method.as_str() {
            "Sort" | "SortBy" | "SortByDescending" | "ThenBy" | "ThenByDescending" | "OrderBy"
            | "OrderByDescending" => {
                shape.sorts.extend(sort_step(&call.method, &call.args, locals));
            }
            "Limit" | "Take" => shape.limit = first.and_then(Expr::as_i64).or(shape.limit),
            "Skip" => shape.skip = first.and_then(Expr::as_i64).or(shape.skip),
            "Project" | "Select" => {
                if let Some(p) = first {
                    shape.projections.extend(extract_projections(p, locals));
                }
            }
            "Where" | "Match" => {
                if let Some(f) = first {
                    shape.filters.extend(extract_filters(f, locals));
                }
            }
            // `AsQueryable().FirstOrDefault(x => ..)` style terminal predicates.
            "First" | "FirstOrDefault" | "FirstOrDefaultAsync" | "FirstAsync" | "Single"
            | "SingleOrDefault" | "SingleOrDefaultAsync" | "Any" | "AnyAsync" | "CountAsync" => {
                if let Some(f @ Expr::Lambda { .. }) = first {
                    shape.filters.extend(extract_filters(f, locals));
                }
            }
            _ => {}
        }
    }
}
