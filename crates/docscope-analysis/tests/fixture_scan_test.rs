//! End-to-end scans of the C# shop fixture: extraction coverage, no-op
//! rescans, and incremental updates driven by real git history.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use docscope_analysis::scanner::{ChangeKind, FileChange, GitSourceControl, IncrementalScanner, ScanState};
use docscope_analysis::InMemoryKnowledgeStore;
use docscope_core::config::DocscopeConfig;
use docscope_core::model::{
    EntityType, Fact, NullabilityContext, OperationKind, RelationshipType, ResolutionMethod,
};
use docscope_core::tracing::{Counter, RunMetrics};
use docscope_core::{CancellationToken, KnowledgeStore};
use git2::{IndexAddOption, Repository, Signature};

fn fixture_root() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test-fixtures/csharp/shop")
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
    index.update_all(["*"].iter(), None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("shop dev", "dev@shop.test").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
}

/// The fixture copied into a fresh git repository with one commit.
fn git_checkout() -> (tempfile::TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    copy_dir(&fixture_root(), dir.path());
    let repo = Repository::init(dir.path()).unwrap();
    commit_all(&repo, "initial import");
    (dir, repo)
}

fn scanner() -> IncrementalScanner {
    IncrementalScanner::new(&DocscopeConfig::default(), Arc::new(GitSourceControl))
}

fn facts_of(store: &InMemoryKnowledgeStore, entity_type: EntityType) -> Vec<Fact> {
    store
        .active_facts("shop")
        .unwrap()
        .into_iter()
        .filter(|f| f.entity_type() == entity_type)
        .collect()
}

#[test]
fn full_scan_extracts_the_shop_fixture() {
    let (dir, _repo) = git_checkout();
    let store = InMemoryKnowledgeStore::new();
    let metrics = RunMetrics::new();
    let result = scanner()
        .scan("shop", dir.path(), &store, &CancellationToken::new(), &metrics)
        .unwrap();
    let outcome = &result.data;
    assert!(result.is_clean(), "unexpected errors: {:?}", result.errors);
    assert_eq!(outcome.states.first(), Some(&ScanState::NoPriorState));
    assert_eq!(outcome.final_state(), Some(ScanState::Completed));
    assert_eq!(outcome.integrity_violations, 0);
    assert!(outcome.revision.as_ref().unwrap().is_clean);

    let types: Vec<_> = facts_of(&store, EntityType::CodeType)
        .into_iter()
        .filter_map(|f| match f {
            Fact::CodeType(t) => Some(t),
            _ => None,
        })
        .collect();
    assert!(types.len() >= 20, "only {} code types", types.len());
    assert!(types.iter().all(|t| t.name != "Generated"), "bin/ must be ignored");
    assert!(types.iter().all(|t| !t.name.ends_with("Repository") && t.name != "ShopSettings"));
    let customer = types.iter().find(|t| t.name == "Customer").unwrap();
    assert_eq!(customer.nullability, NullabilityContext::Enabled);
    let field = |name: &str| customer.fields.iter().find(|f| f.name == name).unwrap();
    assert!(field("Phone").nullable);
    assert!(!field("Name").nullable);
    assert!(field("Id").is_id);
    assert_eq!(field("Email").element_name, "email");

    let mappings: Vec<_> = facts_of(&store, EntityType::CollectionMapping)
        .into_iter()
        .filter_map(|f| match f {
            Fact::CollectionMapping(m) => Some(m),
            _ => None,
        })
        .collect();
    let method_of = |collection: &str| {
        mappings
            .iter()
            .filter(|m| m.collection_name.as_deref() == Some(collection))
            .map(|m| m.method)
            .collect::<Vec<_>>()
    };
    assert!(method_of("customers").contains(&ResolutionMethod::Constant));
    assert!(method_of("suppliers").contains(&ResolutionMethod::Literal));
    assert!(method_of("inventory_items").contains(&ResolutionMethod::Constant));
    assert!(method_of("audit_log").contains(&ResolutionMethod::Literal));
    assert!(mappings
        .iter()
        .any(|m| m.method == ResolutionMethod::Environment && m.type_name.ends_with("Notification")));
    assert!(mappings
        .iter()
        .any(|m| m.method == ResolutionMethod::Config && m.type_name.ends_with("Review")));
    assert!(mappings.iter().all(|m| (0.0..=1.0).contains(&m.confidence)));

    assert!(mappings.len() >= 10, "only {} collection mappings", mappings.len());
    let explicit: Vec<_> = mappings
        .iter()
        .filter(|m| m.method != ResolutionMethod::Inferred)
        .collect();
    let static_names = explicit
        .iter()
        .filter(|m| matches!(m.method, ResolutionMethod::Literal | ResolutionMethod::Constant))
        .count();
    assert!(explicit.len() >= 15, "only {} explicit call sites", explicit.len());
    assert!(
        static_names as f64 >= 0.8 * explicit.len() as f64,
        "{static_names} of {} call sites resolved to a literal or constant",
        explicit.len()
    );

    let operations: Vec<_> = facts_of(&store, EntityType::QueryOperation)
        .into_iter()
        .filter_map(|f| match f {
            Fact::QueryOperation(o) => Some(o),
            _ => None,
        })
        .collect();
    assert!(operations.len() >= 30, "only {} operations", operations.len());
    assert!(operations.iter().any(|o| o.kind == OperationKind::Aggregate
        && o.pipeline
            .as_ref()
            .is_some_and(|p| p.iter().any(|s| s.operator == "$lookup"))));
    assert!(operations.iter().any(|o| o.is_transactional));
    assert!(operations.iter().any(|o| o.kind == OperationKind::FindOneAndUpdate));
    assert!(operations.iter().all(|o| o.collection_mapping.entity_type == EntityType::CollectionMapping));

    let relationships: Vec<_> = facts_of(&store, EntityType::DataRelationship)
        .into_iter()
        .filter_map(|f| match f {
            Fact::DataRelationship(r) => Some(r),
            _ => None,
        })
        .collect();
    assert!(relationships
        .iter()
        .any(|r| r.source_name.ends_with("Order") && r.target_name.ends_with("Customer")));
    assert!(relationships
        .iter()
        .any(|r| r.relationship_type == RelationshipType::Inheritance
            && r.source_name.ends_with("FixedPromotion")));
    assert!(relationships.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));

    let facts = store.active_facts("shop").unwrap();
    assert!(facts.iter().all(|f| f.provenance().is_valid()));
    assert_eq!(metrics.get(Counter::RepositoriesScanned), 1);
    assert!(!store.search("customer email", 10).unwrap().is_empty());
}

#[test]
fn rescanning_an_unchanged_commit_is_a_no_op() {
    let (dir, _repo) = git_checkout();
    let store = InMemoryKnowledgeStore::new();
    let scanner = scanner();
    let cancel = CancellationToken::new();
    scanner.scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();
    let before = store.entries_for_repository("shop").unwrap();

    let again = scanner.scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();
    assert_eq!(
        again.data.states,
        vec![
            ScanState::HasPriorCommit,
            ScanState::DiffChangedFiles,
            ScanState::NoChanges,
            ScanState::Completed
        ]
    );
    assert_eq!(store.entries_for_repository("shop").unwrap(), before);
}

#[test]
fn forced_full_rescan_writes_nothing_new() {
    let (dir, _repo) = git_checkout();
    let store = InMemoryKnowledgeStore::new();
    let cancel = CancellationToken::new();
    scanner().scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();

    let mut config = DocscopeConfig::default();
    config.scan.force_full_scan = Some(true);
    let forced = IncrementalScanner::new(&config, Arc::new(GitSourceControl));
    let result = forced.scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();
    assert!(result.data.states.contains(&ScanState::FullScan));
    assert_eq!(result.data.files_reused, 0);
    assert_eq!(result.data.stats.written(), 0);
    assert_eq!(result.data.retired, 0);
}

#[test]
fn modified_file_only_touches_its_own_facts() {
    let (dir, repo) = git_checkout();
    let store = InMemoryKnowledgeStore::new();
    let scanner = scanner();
    let cancel = CancellationToken::new();
    let first = scanner.scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();
    let first_at = first.data.revision.unwrap().extracted_at;

    let catalog = dir.path().join("Models/Catalog.cs");
    let source = fs::read_to_string(&catalog).unwrap();
    let edited = source.replacen(
        "    public decimal Amount { get; set; }\n}",
        "    public decimal Amount { get; set; }\n    public string Currency { get; set; } = \"EUR\";\n}",
        1,
    );
    assert_ne!(source, edited);
    fs::write(&catalog, edited).unwrap();
    commit_all(&repo, "add promotion currency");

    let second = scanner.scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();
    let outcome = &second.data;
    assert_eq!(
        outcome.states,
        vec![
            ScanState::HasPriorCommit,
            ScanState::DiffChangedFiles,
            ScanState::HasChanges,
            ScanState::ProcessFiles,
            ScanState::IntegrityCheck,
            ScanState::Completed
        ]
    );
    assert_eq!(outcome.changes, vec![FileChange::new("Models/Catalog.cs", ChangeKind::Modified)]);
    assert_eq!(outcome.files_analyzed, 1);
    assert!(outcome.files_reused >= 10);
    assert!(outcome.stats.updated >= 1);
    assert_eq!(outcome.stats.inserted, 0);
    assert_eq!(outcome.retired, 0);
    assert_eq!(outcome.integrity_violations, 0);

    let touched: Vec<_> = store
        .entries_for_repository("shop")
        .unwrap()
        .into_iter()
        .filter(|e| e.last_updated > first_at)
        .collect();
    assert!(!touched.is_empty());
    assert!(touched.iter().all(|e| e.provenance.file_path == "Models/Catalog.cs"));
}

#[test]
fn deleted_file_retires_its_facts_and_snapshot() {
    let (dir, repo) = git_checkout();
    let store = InMemoryKnowledgeStore::new();
    let scanner = scanner();
    let cancel = CancellationToken::new();
    scanner.scan("shop", dir.path(), &store, &cancel, &RunMetrics::new()).unwrap();

    fs::remove_file(dir.path().join("Models/Engagement.cs")).unwrap();
    commit_all(&repo, "drop engagement models");
    let metrics = RunMetrics::new();
    let result = scanner.scan("shop", dir.path(), &store, &cancel, &metrics).unwrap();

    assert!(result
        .data
        .changes
        .contains(&FileChange::new("Models/Engagement.cs", ChangeKind::Deleted)));
    assert!(result.data.retired > 0);
    assert_eq!(metrics.get(Counter::EntriesRetired), result.data.retired as u64);
    assert_eq!(result.data.integrity_violations, 0);
    assert!(store
        .active_facts("shop")
        .unwrap()
        .iter()
        .all(|f| f.provenance().file_path != "Models/Engagement.cs"));
    assert!(store
        .file_snapshots("shop")
        .unwrap()
        .iter()
        .all(|s| s.file_path != "Models/Engagement.cs"));
    assert!(facts_of(&store, EntityType::CodeType)
        .iter()
        .all(|f| !f.label().contains("Review")));
}
