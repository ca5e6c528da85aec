//! Repository-wide extraction over a set of file analyses.

use std::sync::Arc;

use docscope_core::config::DocscopeConfig;
use docscope_core::model::{
    CodeType, DataRelationship, EntityId, EntityType, Fact, QueryOperation, SourceRevision,
};
use docscope_core::tracing::{Counter, RunMetrics};

use super::project::ProjectDefaults;
use crate::operations::OperationExtractor;
use crate::relationships::RelationshipInferencer;
use crate::resolver::{CollectionResolver, ResolvedMappings};
use crate::semantic::SymbolTable;
use crate::source::FileAnalysis;

/// Everything extracted from one repository revision.
#[derive(Debug, Default)]
pub struct Extraction {
    pub code_types: Vec<CodeType>,
    pub mappings: ResolvedMappings,
    pub operations: Vec<QueryOperation>,
    pub relationships: Vec<DataRelationship>,
}

impl Extraction {
    pub fn facts(&self) -> Vec<Fact> {
        let mut facts = Vec::with_capacity(
            self.code_types.len()
                + self.mappings.mappings.len()
                + self.operations.len()
                + self.relationships.len(),
        );
        facts.extend(self.code_types.iter().cloned().map(Fact::from));
        facts.extend(self.mappings.mappings.iter().cloned().map(Fact::from));
        facts.extend(self.operations.iter().cloned().map(Fact::from));
        facts.extend(self.relationships.iter().cloned().map(Fact::from));
        facts
    }
}

/// Attach ids and provenance to the declared types of every analysis.
pub fn code_types(
    analyses: &[Arc<FileAnalysis>],
    projects: &ProjectDefaults,
    revision: &SourceRevision,
) -> Vec<CodeType> {
    let mut out = Vec::new();
    for analysis in analyses {
        for declared in &analysis.types {
            let full_name = declared.full_name();
            let mut ty = CodeType {
                id: EntityId::derive(
                    EntityType::CodeType,
                    &revision.repository,
                    &analysis.file_path,
                    &full_name,
                    "",
                ),
                name: declared.name.clone(),
                namespace: declared.namespace.clone(),
                kind: declared.kind,
                fields: declared.fields.clone(),
                attributes: declared.attributes.clone(),
                base_types: declared.base_types.clone(),
                nullability: declared.nullability,
                discriminators: declared.discriminators.clone(),
                provenance: revision.provenance(&analysis.file_path, &full_name, declared.line_span),
            };
            projects.apply(&mut ty);
            out.push(ty);
        }
    }
    out
}

pub struct Extractor {
    resolver: CollectionResolver,
    operations: OperationExtractor,
    relationships: RelationshipInferencer,
}

impl Extractor {
    pub fn new(config: &DocscopeConfig) -> Self {
        Self {
            resolver: CollectionResolver::new(&config.resolution),
            operations: OperationExtractor::new(),
            relationships: RelationshipInferencer::new(),
        }
    }

    /// Types, then mappings (constants resolve across files), then
    /// operations, then relationships.
    pub fn run(
        &self,
        analyses: &[Arc<FileAnalysis>],
        projects: &ProjectDefaults,
        revision: &SourceRevision,
        metrics: &RunMetrics,
    ) -> Extraction {
        let code_types = metrics.time("types", || code_types(analyses, projects, revision));
        let symbols = SymbolTable::from_analyses(analyses.iter().map(Arc::as_ref));
        let mappings = metrics.time("resolution", || {
            self.resolver.resolve(analyses, &code_types, &symbols, revision)
        });
        let operations = metrics.time("operations", || {
            self.operations.extract(analyses, &code_types, &mappings, revision)
        });
        let relationships = metrics.time("relationships", || {
            self.relationships.infer(&code_types, &mappings, &operations, revision)
        });

        metrics.add(Counter::TypesExtracted, code_types.len() as u64);
        metrics.add(Counter::MappingsResolved, mappings.mappings.len() as u64);
        metrics.add(Counter::OperationsExtracted, operations.len() as u64);
        metrics.add(Counter::RelationshipsInferred, relationships.len() as u64);
        tracing::info!(
            repository = %revision.repository,
            types = code_types.len(),
            mappings = mappings.mappings.len(),
            operations = operations.len(),
            relationships = relationships.len(),
            "extraction complete"
        );
        Extraction {
            code_types,
            mappings,
            operations,
            relationships,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceAnalyzer;
    use chrono::Utc;
    use docscope_core::model::{NullabilityContext, OperationKind, RelationshipType, ResolutionMethod};

    fn revision() -> SourceRevision {
        SourceRevision {
            repository: "shop".into(),
            commit_id: "abc123".into(),
            branch: Some("main".into()),
            tag: None,
            is_clean: true,
            extracted_at: Utc::now(),
            extractor_version: "test".into(),
        }
    }

    #[test]
    fn extracts_across_files() {
        let analyzer = SourceAnalyzer::new(&DocscopeConfig::default());
        let files = [
            (
                "Models/Vendor.cs",
                r#"namespace Shop.Models;
public class Vendor
{
    public string Id { get; set; }
    public string Name { get; set; }
}
public class VendorEntity
{
    public string Id { get; set; }
}"#,
            ),
            (
                "Data/Names.cs",
                r#"namespace Shop.Data;
public static class Names
{
    public const string Vendors = "vendors";
}"#,
            ),
            (
                "Data/VendorStore.cs",
                r#"using MongoDB.Driver;
using Shop.Models;
namespace Shop.Data;
public class VendorStore
{
    private readonly IMongoCollection<Vendor> _vendors;
    public VendorStore(IMongoDatabase db)
    {
        _vendors = db.GetCollection<Vendor>(Names.Vendors);
    }
    public Vendor Get(string id) => _vendors.Find(v => v.Id == id).FirstOrDefault();
}"#,
            ),
        ];
        let analyses: Vec<Arc<FileAnalysis>> = files
            .iter()
            .map(|(path, src)| analyzer.analyze(path, src, "h").unwrap())
            .collect();
        let defaults = ProjectDefaults::from_projects([(
            "Shop.csproj",
            "<Project><PropertyGroup><Nullable>enable</Nullable></PropertyGroup></Project>",
        )]);
        let metrics = RunMetrics::new();
        let extraction = Extractor::new(&DocscopeConfig::default()).run(&analyses, &defaults, &revision(), &metrics);

        assert_eq!(extraction.code_types.len(), 2);
        let vendor = &extraction.code_types[0];
        assert_eq!(vendor.nullability, NullabilityContext::Enabled);
        assert!(vendor.fields.iter().all(|f| !f.nullable));

        let constant = extraction
            .mappings
            .mappings
            .iter()
            .find(|m| m.method == ResolutionMethod::Constant)
            .unwrap();
        assert_eq!(constant.collection_name.as_deref(), Some("vendors"));
        assert!((constant.confidence - 0.9).abs() < 1e-9);

        let inferred = extraction
            .mappings
            .mappings
            .iter()
            .find(|m| m.type_name == "Shop.Models.VendorEntity")
            .unwrap();
        assert_eq!(inferred.collection_name.as_deref(), Some("vendors"));
        assert!(!inferred.is_primary);

        assert_eq!(extraction.operations.len(), 1);
        assert!(extraction.facts().iter().all(|f| f.provenance().is_valid()));
        assert_eq!(metrics.get(Counter::TypesExtracted), 2);
    }

    #[test]
    fn lookup_on_an_untyped_handle_links_the_mapped_types() {
        let analyzer = SourceAnalyzer::new(&DocscopeConfig::default());
        let files = [
            (
                "Models/Order.cs",
                r#"namespace Shop.Models;
public class Order
{
    public string Id { get; set; }
    public string CustomerId { get; set; }
}
public class Customer
{
    public string Id { get; set; }
    public string Name { get; set; }
}"#,
            ),
            (
                "Data/OrderReports.cs",
                r#"using MongoDB.Bson;
using MongoDB.Driver;
namespace Shop.Data;
public class OrderReports
{
    private readonly IMongoCollection<BsonDocument> _orders;
    public OrderReports(IMongoDatabase db)
    {
        _orders = db.GetCollection<BsonDocument>("orders");
    }
    public List<BsonDocument> WithCustomers() =>
        _orders.Aggregate().Lookup("customers", "customerId", "_id", "customer").ToList();
}"#,
            ),
        ];
        let analyses: Vec<Arc<FileAnalysis>> = files
            .iter()
            .map(|(path, src)| analyzer.analyze(path, src, "h").unwrap())
            .collect();
        let extraction = Extractor::new(&DocscopeConfig::default()).run(
            &analyses,
            &ProjectDefaults::default(),
            &revision(),
            &RunMetrics::new(),
        );

        let aggregate = extraction
            .operations
            .iter()
            .find(|o| o.kind == OperationKind::Aggregate)
            .unwrap();
        assert_eq!(aggregate.collection_name.as_deref(), Some("orders"));
        let lookups: Vec<_> = extraction
            .relationships
            .iter()
            .filter(|r| r.relationship_type == RelationshipType::Lookup)
            .collect();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].source_name, "Shop.Models.Order");
        assert_eq!(lookups[0].target_name, "Shop.Models.Customer");
    }

    #[test]
    fn type_without_call_site_gets_one_inferred_mapping() {
        let analyzer = SourceAnalyzer::new(&DocscopeConfig::default());
        let analyses = vec![analyzer
            .analyze(
                "Models/OrderEntity.cs",
                r#"namespace Shop.Models;
public class OrderEntity
{
    public string Id { get; set; }
    public decimal Total { get; set; }
}"#,
                "h",
            )
            .unwrap()];
        let extraction = Extractor::new(&DocscopeConfig::default()).run(
            &analyses,
            &ProjectDefaults::default(),
            &revision(),
            &RunMetrics::new(),
        );

        let mappings = &extraction.mappings.mappings;
        assert_eq!(mappings.len(), 1);
        let mapping = &mappings[0];
        assert_eq!(mapping.type_name, "Shop.Models.OrderEntity");
        assert_eq!(mapping.collection_name.as_deref(), Some("orders"));
        assert_eq!(mapping.method, ResolutionMethod::Inferred);
        assert!((mapping.confidence - 0.3).abs() < 1e-9);
        assert!(!mapping.is_primary);
        assert_eq!(
            extraction.mappings.by_collection("orders").map(|m| &m.id),
            Some(&mapping.id)
        );
    }
}
