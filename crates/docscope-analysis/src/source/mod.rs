//! C# source analysis: parse a file and collect type declarations, constant
//! symbols, collection call sites, handles and driver operation sites.
//!
//! Results are keyed by content hash in a moka cache so repeated scans of an
//! unchanged file (several repositories vendoring the same models, or a full
//! rescan after an incremental one) skip the parse.

pub mod analysis;
pub mod declarations;
mod walker;

use std::path::Path;
use std::sync::Arc;

use docscope_core::config::DocscopeConfig;
use docscope_core::errors::AnalysisError;
use moka::sync::Cache;
use xxhash_rust::xxh3::xxh3_64;

pub use analysis::{
    CallSiteSource, ChainCall, CollectionCallSite, DeclaredType, FileAnalysis, HandleDecl,
    HandleKind, OperationSite, Receiver, SiteScope, SymbolDecl, SymbolKind,
};

use crate::parsers::parse_csharp;
use walker::Walker;

const CACHE_CAPACITY: u64 = 4_096;

/// Per-file analyzer. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct SourceAnalyzer {
    handle_types: Arc<Vec<String>>,
    malformed_ratio: f64,
    fingerprint: u64,
    cache: Cache<u64, Arc<FileAnalysis>>,
}

impl SourceAnalyzer {
    pub fn new(config: &DocscopeConfig) -> Self {
        let handle_types = config.resolution.handle_types.clone();
        let malformed_ratio = config.scan.effective_malformed_error_ratio();
        let fingerprint = xxh3_64(format!("{handle_types:?}|{malformed_ratio}").as_bytes());
        Self {
            handle_types: Arc::new(handle_types),
            malformed_ratio,
            fingerprint,
            cache: Cache::builder().max_capacity(CACHE_CAPACITY).build(),
        }
    }

    /// Analyze one file. `file_path` is repository-relative and is only used
    /// for naming; `content_hash` is recorded as given.
    pub fn analyze(
        &self,
        file_path: &str,
        source: &str,
        content_hash: &str,
    ) -> Result<Arc<FileAnalysis>, AnalysisError> {
        let key = self.cache_key(file_path, source);
        if let Some(hit) = self.cache.get(&key) {
            if hit.content_hash == content_hash {
                return Ok(hit);
            }
        }
        let mut analysis = self.analyze_source(file_path, source)?;
        analysis.content_hash = content_hash.to_string();
        let analysis = Arc::new(analysis);
        self.cache.insert(key, Arc::clone(&analysis));
        Ok(analysis)
    }

    /// Parse and walk without touching the cache.
    pub fn analyze_source(&self, file_path: &str, source: &str) -> Result<FileAnalysis, AnalysisError> {
        let path = Path::new(file_path);
        let parsed = parse_csharp(source, path)?;
        if parsed.errors.ratio() > self.malformed_ratio {
            return Err(AnalysisError::Malformed {
                path: path.to_path_buf(),
                error_nodes: parsed.errors.error_nodes,
                total_nodes: parsed.errors.total_nodes,
            });
        }
        if parsed.errors.error_nodes > 0 {
            tracing::debug!(
                file = file_path,
                error_nodes = parsed.errors.error_nodes,
                "partial parse, continuing with recoverable nodes"
            );
        }
        let mut analysis =
            Walker::new(source, &self.handle_types, file_path).finish(parsed.tree.root_node());
        analysis.error_nodes = parsed.errors.error_nodes;
        analysis.total_nodes = parsed.errors.total_nodes;
        Ok(analysis)
    }

    fn cache_key(&self, file_path: &str, source: &str) -> u64 {
        let mut buf = Vec::with_capacity(file_path.len() + source.len() + 9);
        buf.extend_from_slice(&self.fingerprint.to_le_bytes());
        buf.extend_from_slice(file_path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(source.as_bytes());
        xxh3_64(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Expr;

    fn analyze(src: &str) -> FileAnalysis {
        SourceAnalyzer::new(&DocscopeConfig::default())
            .analyze_source("Data/Repo.cs", src)
            .unwrap()
    }

    const REPOSITORY: &str = r#"
using MongoDB.Driver;
using Shop.Models;

namespace Shop.Data
{
    public class OrderRepository
    {
        private const string CollectionName = "orders";
        private readonly IMongoCollection<Order> _orders;

        public OrderRepository(IMongoDatabase database)
        {
            _orders = database.GetCollection<Order>(CollectionName);
        }

        public async Task<List<Order>> ForCustomer(string customerId)
        {
            var filter = Builders<Order>.Filter.Eq(o => o.CustomerId, customerId);
            return await _orders.Find(filter).SortByDescending(o => o.CreatedAt).Limit(20).ToListAsync();
        }
    }
}
"#;

    #[test]
    fn collects_symbols_call_sites_and_handles() {
        let a = analyze(REPOSITORY);
        assert_eq!(a.usings, vec!["MongoDB.Driver", "Shop.Models"]);
        assert!(a.types.is_empty(), "repositories are not POCOs");

        let symbol = &a.symbols[0];
        assert_eq!(symbol.container, "Shop.Data.OrderRepository");
        assert_eq!(symbol.kind, SymbolKind::Const);
        assert_eq!(symbol.initializer, Some(Expr::StringLiteral("orders".into())));

        assert_eq!(a.call_sites.len(), 1);
        let site = &a.call_sites[0];
        assert_eq!(site.type_argument, "Order");
        assert_eq!(site.assigned_to.as_deref(), Some("_orders"));
        assert_eq!(site.argument, Expr::Identifier("CollectionName".into()));

        let handle = a.handles.iter().find(|h| h.name == "_orders").unwrap();
        assert_eq!(handle.kind, HandleKind::Field);
        assert_eq!(handle.call_site, Some(0));
        assert!(a.has_database_usage());
    }

    #[test]
    fn collects_operation_with_chain_and_locals() {
        let a = analyze(REPOSITORY);
        assert_eq!(a.operations.len(), 1);
        let op = &a.operations[0];
        assert_eq!(op.method, "Find");
        assert!(op.is_awaited || op.chain.iter().any(|c| c.method == "ToListAsync"));
        assert_eq!(
            op.receiver,
            Receiver::Handle {
                name: "_orders".into(),
                qualifier: None
            }
        );
        let chain: Vec<_> = op.chain.iter().map(|c| c.method.as_str()).collect();
        assert_eq!(chain, vec!["SortByDescending", "Limit", "ToListAsync"]);
        assert_eq!(op.locals[0].0, "filter");
        assert_eq!(op.scope.symbol(), "Shop.Data.OrderRepository.ForCustomer");
    }

    #[test]
    fn collects_poco_with_attributes() {
        let a = analyze(
            r#"
namespace Shop.Models;

[BsonCollection("customers")]
public class Customer
{
    [BsonId]
    public string Id { get; set; }
    [BsonElement("email")]
    public string Email { get; set; }
    public List<Address> Addresses { get; set; }
}
"#,
        );
        assert_eq!(a.types.len(), 1);
        let ty = &a.types[0];
        assert_eq!(ty.full_name(), "Shop.Models.Customer");
        assert_eq!(ty.fields.len(), 3);
        assert_eq!(ty.fields[1].element_name, "email");
        assert_eq!(a.call_sites.len(), 1);
        assert_eq!(a.call_sites[0].source, CallSiteSource::Attribute);
        assert_eq!(a.call_sites[0].argument, Expr::StringLiteral("customers".into()));
    }

    #[test]
    fn inline_get_collection_is_a_call_site_receiver() {
        let a = analyze(
            r#"
class Jobs {
    void Run(IMongoDatabase db) {
        db.GetCollection<Job>("jobs").DeleteMany(j => j.Done);
    }
}
"#,
        );
        assert_eq!(a.call_sites.len(), 1);
        assert_eq!(a.operations.len(), 1);
        assert_eq!(a.operations[0].receiver, Receiver::CallSite(0));
    }

    #[test]
    fn var_local_from_get_collection_is_a_handle() {
        let a = analyze(
            r#"
class Audit {
    void Write(IMongoDatabase db, AuditEvent e) {
        var events = db.GetCollection<AuditEvent>("audit_events");
        events.InsertOne(e);
    }
}
"#,
        );
        let handle = a.handles.iter().find(|h| h.name == "events").unwrap();
        assert_eq!(handle.kind, HandleKind::Local);
        assert_eq!(handle.type_argument, "AuditEvent");
        assert_eq!(handle.call_site, Some(0));
        assert_eq!(a.operations[0].method, "InsertOne");
    }

    #[test]
    fn file_over_error_ratio_is_malformed() {
        let mut config = DocscopeConfig::default();
        config.scan.malformed_error_ratio = Some(0.0);
        let err = SourceAnalyzer::new(&config)
            .analyze_source("Bad.cs", "class A { void M( { int x = ; }")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed { .. }));
    }

    #[test]
    fn cache_returns_same_analysis_for_same_content() {
        let analyzer = SourceAnalyzer::new(&DocscopeConfig::default());
        let a = analyzer.analyze("Repo.cs", REPOSITORY, "h1").unwrap();
        let b = analyzer.analyze("Repo.cs", REPOSITORY, "h1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
