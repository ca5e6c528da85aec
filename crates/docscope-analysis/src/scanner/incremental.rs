//! Incremental repository scans.
//!
//! A scan walks a small state machine:
//!
//! ```text
//! NoPriorState -> FullScan ------------------------------+
//! HasPriorCommit -> DiffChangedFiles -> NoChanges -------+-> Completed
//!                                   \-> HasChanges -> ProcessFiles -> IntegrityCheck
//! ```
//!
//! File-level change detection is by content hash against the persisted
//! `FileAnalysis` snapshots, so a dirty working tree is handled the same way
//! as a new commit. Repository-wide inference always re-runs over the merged
//! corpus; facts whose content did not change become no-op upserts.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docscope_core::config::DocscopeConfig;
use docscope_core::errors::{AnalysisError, PipelineError, PipelineResult, RepositoryError, ResourceError, StorageError};
use docscope_core::model::{EntityId, EntityType, KnowledgeBaseEntry, SourceRevision};
use docscope_core::tracing::{Counter, RunMetrics};
use docscope_core::traits::{Cancellable, FileSnapshot, KnowledgeStore, RepositoryState, UpsertStats};
use docscope_core::types::{FxHashMap, FxHashSet};
use docscope_core::EXTRACTOR_VERSION;
use rayon::prelude::*;
use serde::Serialize;

use super::extraction::Extractor;
use super::hasher::content_hash_hex;
use super::project::ProjectDefaults;
use super::source_control::{ChangeKind, FileChange, HeadInfo, SourceControl};
use super::walker::{discover, DiscoveredFile};
use crate::knowledge::KnowledgeBaseWriter;
use crate::source::{FileAnalysis, SourceAnalyzer};

/// Commit id recorded for directories that are not under source control.
pub const UNVERSIONED: &str = "unversioned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    NoPriorState,
    HasPriorCommit,
    FullScan,
    DiffChangedFiles,
    NoChanges,
    HasChanges,
    ProcessFiles,
    IntegrityCheck,
    Completed,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoPriorState => "no_prior_state",
            Self::HasPriorCommit => "has_prior_commit",
            Self::FullScan => "full_scan",
            Self::DiffChangedFiles => "diff_changed_files",
            Self::NoChanges => "no_changes",
            Self::HasChanges => "has_changes",
            Self::ProcessFiles => "process_files",
            Self::IntegrityCheck => "integrity_check",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub repository: String,
    pub revision: Option<SourceRevision>,
    /// States visited, in order.
    pub states: Vec<ScanState>,
    /// Source files added, modified or deleted since the previous scan.
    pub changes: Vec<FileChange>,
    pub files_analyzed: usize,
    pub files_reused: usize,
    pub files_failed: usize,
    pub stats: UpsertStats,
    pub retired: usize,
    pub integrity_violations: usize,
}

impl ScanOutcome {
    fn enter(&mut self, state: ScanState) {
        tracing::debug!(repository = %self.repository, state = %state, "scan state");
        self.states.push(state);
    }

    pub fn final_state(&self) -> Option<ScanState> {
        self.states.last().copied()
    }
}

enum FileResult {
    Reused(Arc<FileAnalysis>),
    Analyzed(Arc<FileAnalysis>),
    Failed(AnalysisError),
}

struct ProcessedFile {
    relative: String,
    content_hash: Option<String>,
    result: FileResult,
}

pub struct IncrementalScanner {
    config: DocscopeConfig,
    analyzer: SourceAnalyzer,
    extractor: Extractor,
    writer: KnowledgeBaseWriter,
    source_control: Arc<dyn SourceControl>,
}

impl IncrementalScanner {
    pub fn new(config: &DocscopeConfig, source_control: Arc<dyn SourceControl>) -> Self {
        Self {
            config: config.clone(),
            analyzer: SourceAnalyzer::new(config),
            extractor: Extractor::new(config),
            writer: KnowledgeBaseWriter::new(&config.storage),
            source_control,
        }
    }

    pub fn writer(&self) -> &KnowledgeBaseWriter {
        &self.writer
    }

    /// Scan one repository and merge its facts into `store`.
    ///
    /// Per-file failures are collected in the result. Repository-level
    /// failures (missing root, nothing parseable, no database usage) are
    /// returned as `Err` and leave the store untouched.
    pub fn scan(
        &self,
        repository: &str,
        root: &Path,
        store: &dyn KnowledgeStore,
        cancel: &(dyn Cancellable + Sync),
        metrics: &RunMetrics,
    ) -> Result<PipelineResult<ScanOutcome>, PipelineError> {
        let _span = tracing::info_span!("scan", repository).entered();
        if !root.is_dir() {
            return Err(RepositoryError::NotFound {
                repository: repository.to_string(),
                path: root.display().to_string(),
            }
            .into());
        }

        let head = self.head(repository, root)?;
        let revision = SourceRevision {
            repository: repository.to_string(),
            commit_id: head.commit_id.clone(),
            branch: head.branch.clone(),
            tag: head.tag.clone(),
            is_clean: head.is_clean,
            extracted_at: Utc::now(),
            extractor_version: EXTRACTOR_VERSION.to_string(),
        };
        let mut result = PipelineResult::new(ScanOutcome {
            repository: repository.to_string(),
            ..Default::default()
        });
        let outcome = &mut result.data;

        let force_full = self.config.scan.effective_force_full_scan();
        let prior = store.repository_state(repository)?;
        match &prior {
            Some(state) if !force_full => {
                outcome.enter(ScanState::HasPriorCommit);
                outcome.enter(ScanState::DiffChangedFiles);
                if state.last_commit == head.commit_id && head.is_clean {
                    outcome.enter(ScanState::NoChanges);
                } else {
                    match self.committed_changes(root, &state.last_commit, &head) {
                        Some(changes) if changes.is_empty() && head.is_clean => {
                            outcome.enter(ScanState::NoChanges);
                        }
                        Some(changes) => {
                            tracing::debug!(committed = changes.len(), dirty = !head.is_clean, "changes since last scan");
                            outcome.enter(ScanState::HasChanges);
                        }
                        None => outcome.enter(ScanState::FullScan),
                    }
                }
            }
            Some(_) => {
                outcome.enter(ScanState::HasPriorCommit);
                outcome.enter(ScanState::FullScan);
            }
            None => {
                outcome.enter(ScanState::NoPriorState);
                outcome.enter(ScanState::FullScan);
            }
        }

        if outcome.final_state() == Some(ScanState::NoChanges) {
            store.save_repository_state(&RepositoryState {
                repository: repository.to_string(),
                last_commit: head.commit_id,
                branch: head.branch,
                scanned_at: revision.extracted_at,
            })?;
            outcome.revision = Some(revision);
            outcome.enter(ScanState::Completed);
            metrics.incr(Counter::RepositoriesScanned);
            tracing::info!(repository, "no changes since last scan");
            return Ok(result);
        }
        if outcome.final_state() == Some(ScanState::HasChanges) {
            outcome.enter(ScanState::ProcessFiles);
        }

        // Discovery and per-file analysis.
        let discovery = discover(repository, root, &self.config.scan)?;
        metrics.add(Counter::FilesDiscovered, discovery.sources.len() as u64);
        metrics.add(Counter::FilesSkipped, discovery.oversized.len() as u64);
        for oversized in discovery.oversized {
            tracing::warn!(error = %oversized, "file skipped");
            result.add_error(oversized);
        }
        let outcome = &mut result.data;
        let projects = read_projects(&discovery.projects);

        let snapshots: FxHashMap<String, FileSnapshot> = if force_full {
            FxHashMap::default()
        } else {
            store
                .file_snapshots(repository)?
                .into_iter()
                .map(|s| (s.file_path.clone(), s))
                .collect()
        };
        let known_hashes: FxHashMap<String, String> = if force_full {
            store
                .file_snapshots(repository)?
                .into_iter()
                .map(|s| (s.file_path, s.content_hash))
                .collect()
        } else {
            snapshots
                .iter()
                .map(|(k, v)| (k.clone(), v.content_hash.clone()))
                .collect()
        };

        let processed = self.process_files(&discovery.sources, &snapshots, cancel)?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut analyses = Vec::with_capacity(processed.len());
        let mut failed_files: FxHashSet<String> = FxHashSet::default();
        let mut fresh_snapshots = Vec::new();
        let mut errors = Vec::new();
        for file in processed {
            match (&file.content_hash, known_hashes.get(&file.relative)) {
                (_, None) => outcome.changes.push(FileChange::new(&file.relative, ChangeKind::Added)),
                (Some(hash), Some(known)) if hash != known => {
                    outcome.changes.push(FileChange::new(&file.relative, ChangeKind::Modified))
                }
                _ => {}
            }
            match file.result {
                FileResult::Reused(analysis) => {
                    outcome.files_reused += 1;
                    analyses.push(analysis);
                }
                FileResult::Analyzed(analysis) => {
                    outcome.files_analyzed += 1;
                    match serde_json::to_string(analysis.as_ref()) {
                        Ok(payload) => fresh_snapshots.push(FileSnapshot {
                            repository: repository.to_string(),
                            file_path: file.relative.clone(),
                            content_hash: analysis.content_hash.clone(),
                            payload,
                        }),
                        Err(e) => errors.push(PipelineError::from(StorageError::Serialization {
                            entity: file.relative.clone(),
                            message: e.to_string(),
                        })),
                    }
                    analyses.push(analysis);
                }
                FileResult::Failed(e) => {
                    tracing::warn!(file = %file.relative, error = %e, "file analysis failed");
                    outcome.files_failed += 1;
                    failed_files.insert(file.relative);
                    errors.push(e.into());
                }
            }
        }
        let on_disk: FxHashSet<&str> = discovery.sources.iter().map(|f| f.relative.as_str()).collect();
        let mut deleted: Vec<String> = known_hashes
            .keys()
            .filter(|path| !on_disk.contains(path.as_str()))
            .cloned()
            .collect();
        deleted.sort();
        outcome
            .changes
            .extend(deleted.iter().map(|p| FileChange::new(p, ChangeKind::Deleted)));

        metrics.add(Counter::FilesAnalyzed, outcome.files_analyzed as u64);
        metrics.add(Counter::FilesFromSnapshot, outcome.files_reused as u64);
        metrics.add(Counter::FilesSkipped, outcome.files_failed as u64);
        for e in errors {
            result.add_error(e);
        }

        if analyses.is_empty() && !failed_files.is_empty() {
            return Err(RepositoryError::Malformed {
                repository: repository.to_string(),
                message: format!("all {} source files failed analysis", failed_files.len()),
            }
            .into());
        }
        if !analyses.iter().any(|a| a.has_database_usage()) {
            return Err(RepositoryError::NoRelevantUsage {
                repository: repository.to_string(),
            }
            .into());
        }

        // Repository-wide extraction and merge.
        let before: FxHashMap<(EntityType, EntityId), DateTime<Utc>> = store
            .entries_for_repository(repository)?
            .into_iter()
            .map(|e| ((e.entity_type, e.entity_id), e.last_updated))
            .collect();

        let extraction = self.extractor.run(&analyses, &projects, &revision, metrics);
        let facts = extraction.facts();
        let emitted: FxHashSet<(EntityType, EntityId)> =
            facts.iter().map(|f| (f.entity_type(), f.id().clone())).collect();
        let outcome = &mut result.data;
        outcome.stats = self.writer.write(store, facts, revision.extracted_at, metrics)?;

        let entries = store.entries_for_repository(repository)?;
        let stale: Vec<(EntityType, EntityId)> = entries
            .iter()
            .filter(|e| e.is_active && e.entity_type != EntityType::ObservedSchema)
            .filter(|e| !failed_files.contains(&e.provenance.file_path))
            .map(|e| (e.entity_type, e.entity_id.clone()))
            .filter(|key| !emitted.contains(key))
            .collect();
        outcome.retired = store.retire(&stale, revision.extracted_at)?;

        let entries = store.entries_for_repository(repository)?;
        let orphaned = orphaned_schemas(&entries);
        if !orphaned.is_empty() {
            tracing::debug!(schemas = orphaned.len(), "retiring schemas of retired mappings");
            outcome.retired += store.retire(&orphaned, revision.extracted_at)?;
        }
        metrics.add(Counter::EntriesRetired, outcome.retired as u64);

        store.save_file_snapshots(&fresh_snapshots)?;
        if !deleted.is_empty() {
            store.remove_file_snapshots(repository, &deleted)?;
        }

        outcome.enter(ScanState::IntegrityCheck);
        let entries = store.entries_for_repository(repository)?;
        let violations = integrity_violations(&entries, &before);
        outcome.integrity_violations = violations.len();
        metrics.add(Counter::IntegrityViolations, violations.len() as u64);
        for details in violations {
            tracing::error!(repository, details = %details, "integrity violation");
            result.add_error(StorageError::IntegrityViolation { details });
        }

        store.save_repository_state(&RepositoryState {
            repository: repository.to_string(),
            last_commit: head.commit_id,
            branch: head.branch,
            scanned_at: revision.extracted_at,
        })?;
        let outcome = &mut result.data;
        outcome.revision = Some(revision);
        outcome.enter(ScanState::Completed);
        metrics.incr(Counter::RepositoriesScanned);
        tracing::info!(
            repository,
            analyzed = outcome.files_analyzed,
            reused = outcome.files_reused,
            failed = outcome.files_failed,
            inserted = outcome.stats.inserted,
            updated = outcome.stats.updated,
            retired = outcome.retired,
            "scan complete"
        );
        Ok(result)
    }

    fn head(&self, repository: &str, root: &Path) -> Result<HeadInfo, RepositoryError> {
        match self.source_control.head(root) {
            Ok(head) => Ok(head),
            Err(e) if !root.join(".git").exists() => {
                tracing::warn!(repository, error = %e, "not under source control, scanning working tree");
                Ok(HeadInfo {
                    commit_id: UNVERSIONED.to_string(),
                    branch: None,
                    tag: None,
                    is_clean: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Relevant files changed between the last scanned commit and head.
    /// `None` when the diff is unavailable and a full scan is needed.
    fn committed_changes(&self, root: &Path, last_commit: &str, head: &HeadInfo) -> Option<Vec<FileChange>> {
        if last_commit == head.commit_id {
            return Some(Vec::new());
        }
        if last_commit == UNVERSIONED || head.commit_id == UNVERSIONED {
            return None;
        }
        match self.source_control.changed_files(root, last_commit, &head.commit_id) {
            Ok(changes) => Some(
                changes
                    .into_iter()
                    .filter(|c| c.path.ends_with(".cs") || c.path.ends_with(".csproj"))
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "diff unavailable, falling back to full scan");
                None
            }
        }
    }

    fn process_files(
        &self,
        sources: &[DiscoveredFile],
        snapshots: &FxHashMap<String, FileSnapshot>,
        cancel: &(dyn Cancellable + Sync),
    ) -> Result<Vec<ProcessedFile>, ResourceError> {
        let threads = self.config.scan.effective_max_concurrent_files().max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ResourceError::WorkerPool { message: e.to_string() })?;
        let processed = pool.install(|| {
            sources
                .par_iter()
                .filter_map(|file| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.process_file(file, snapshots.get(&file.relative)))
                })
                .collect()
        });
        Ok(processed)
    }

    fn process_file(&self, file: &DiscoveredFile, snapshot: Option<&FileSnapshot>) -> ProcessedFile {
        let failed = |content_hash: Option<String>, e: AnalysisError| ProcessedFile {
            relative: file.relative.clone(),
            content_hash,
            result: FileResult::Failed(e),
        };
        let bytes = match std::fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(source) => {
                return failed(
                    None,
                    AnalysisError::Io {
                        path: file.path.clone(),
                        source,
                    },
                )
            }
        };
        let content_hash = content_hash_hex(&bytes);

        if let Some(snapshot) = snapshot.filter(|s| s.content_hash == content_hash) {
            match serde_json::from_str::<FileAnalysis>(&snapshot.payload) {
                Ok(analysis) => {
                    tracing::trace!(file = %file.relative, "reusing snapshot");
                    return ProcessedFile {
                        relative: file.relative.clone(),
                        content_hash: Some(content_hash),
                        result: FileResult::Reused(Arc::new(analysis)),
                    };
                }
                Err(e) => tracing::debug!(file = %file.relative, error = %e, "unreadable snapshot, re-analyzing"),
            }
        }

        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(_) => {
                return failed(
                    Some(content_hash),
                    AnalysisError::InvalidEncoding {
                        path: file.path.clone(),
                    },
                )
            }
        };
        match self.analyzer.analyze(&file.relative, &source, &content_hash) {
            Ok(analysis) => ProcessedFile {
                relative: file.relative.clone(),
                content_hash: Some(content_hash),
                result: FileResult::Analyzed(analysis),
            },
            Err(e) => failed(Some(content_hash), e),
        }
    }
}

fn read_projects(projects: &[DiscoveredFile]) -> ProjectDefaults {
    let contents: Vec<(String, String)> = projects
        .iter()
        .filter_map(|p| match std::fs::read_to_string(&p.path) {
            Ok(xml) => Some((p.relative.clone(), xml)),
            Err(e) => {
                tracing::debug!(file = %p.relative, error = %e, "project file unreadable");
                None
            }
        })
        .collect();
    ProjectDefaults::from_projects(contents.iter().map(|(p, x)| (p.as_str(), x.as_str())))
}

/// Active schemas referencing an entity that is no longer active.
fn orphaned_schemas(entries: &[KnowledgeBaseEntry]) -> Vec<(EntityType, EntityId)> {
    let active: FxHashSet<(EntityType, &EntityId)> = entries
        .iter()
        .filter(|e| e.is_active)
        .map(|e| (e.entity_type, &e.entity_id))
        .collect();
    entries
        .iter()
        .filter(|e| e.is_active && e.entity_type == EntityType::ObservedSchema)
        .filter(|e| {
            e.references
                .iter()
                .any(|r| !active.contains(&(r.entity_type, &r.entity_id)))
        })
        .map(|e| (e.entity_type, e.entity_id.clone()))
        .collect()
}

/// Post-merge checks over the entries of one repository: references of
/// active entries resolve to active entries, provenance is valid, and
/// `last_updated` never moved backwards relative to `before`.
pub fn integrity_violations(
    entries: &[KnowledgeBaseEntry],
    before: &FxHashMap<(EntityType, EntityId), DateTime<Utc>>,
) -> Vec<String> {
    let active: FxHashSet<(EntityType, &EntityId)> = entries
        .iter()
        .filter(|e| e.is_active)
        .map(|e| (e.entity_type, &e.entity_id))
        .collect();
    let mut out = Vec::new();
    for entry in entries {
        if entry.is_active {
            for r in &entry.references {
                if !active.contains(&(r.entity_type, &r.entity_id)) {
                    out.push(format!(
                        "{} {} references inactive or missing {} {} ({})",
                        entry.entity_type.name(),
                        entry.entity_id.as_str(),
                        r.entity_type.name(),
                        r.entity_id.as_str(),
                        r.relation
                    ));
                }
            }
            for v in entry.provenance.violations() {
                out.push(format!("{} {}: {v}", entry.entity_type.name(), entry.entity_id.as_str()));
            }
        }
        let key = (entry.entity_type, entry.entity_id.clone());
        if let Some(previous) = before.get(&key) {
            if entry.last_updated < *previous {
                out.push(format!(
                    "{} {} last_updated regressed from {previous} to {}",
                    entry.entity_type.name(),
                    entry.entity_id.as_str(),
                    entry.last_updated
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::InMemoryKnowledgeStore;
    use docscope_core::traits::CancellationToken;
    use std::fs;

    const MODELS: &str = r#"namespace Shop.Models;
public class Customer
{
    public string Id { get; set; }
    public string Email { get; set; }
}
public class Order
{
    public string Id { get; set; }
    public string CustomerId { get; set; }
    public decimal Total { get; set; }
}"#;

    const REPO: &str = r#"using MongoDB.Driver;
using Shop.Models;
namespace Shop.Data;
public class OrderRepository
{
    private readonly IMongoCollection<Order> _orders;
    private readonly IMongoCollection<Customer> _customers;
    public OrderRepository(IMongoDatabase db)
    {
        _orders = db.GetCollection<Order>("orders");
        _customers = db.GetCollection<Customer>("customers");
    }
    public Order Get(string id) => _orders.Find(o => o.Id == id).FirstOrDefault();
    public void Touch(string id) => _customers.UpdateOne(c => c.Id == id, Builders<Customer>.Update.Set(c => c.Email, "x"));
}"#;

    struct NoGit;

    impl SourceControl for NoGit {
        fn head(&self, root: &Path) -> Result<HeadInfo, RepositoryError> {
            Err(RepositoryError::SourceControl {
                repository: root.display().to_string(),
                message: "not a repository".into(),
            })
        }

        fn changed_files(&self, root: &Path, _: &str, _: &str) -> Result<Vec<FileChange>, RepositoryError> {
            self.head(root).map(|_| Vec::new())
        }
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Models")).unwrap();
        fs::create_dir_all(dir.path().join("Data")).unwrap();
        fs::write(dir.path().join("Models/Shop.cs"), MODELS).unwrap();
        fs::write(dir.path().join("Data/OrderRepository.cs"), REPO).unwrap();
        dir
    }

    fn scanner() -> IncrementalScanner {
        IncrementalScanner::new(&DocscopeConfig::default(), Arc::new(NoGit))
    }

    #[test]
    fn unversioned_rescan_reuses_snapshots() {
        let dir = workspace();
        let store = InMemoryKnowledgeStore::new();
        let cancel = CancellationToken::new();
        let metrics = RunMetrics::new();
        let scanner = scanner();

        let first = scanner.scan("shop", dir.path(), &store, &cancel, &metrics).unwrap();
        assert!(first.is_clean(), "{:?}", first.errors);
        assert_eq!(first.data.states.first(), Some(&ScanState::NoPriorState));
        assert_eq!(first.data.final_state(), Some(ScanState::Completed));
        assert_eq!(first.data.files_analyzed, 2);
        assert!(first.data.stats.inserted > 0);

        let second = scanner.scan("shop", dir.path(), &store, &cancel, &metrics).unwrap();
        assert!(second.data.states.contains(&ScanState::HasChanges));
        assert_eq!(second.data.files_reused, 2);
        assert_eq!(second.data.files_analyzed, 0);
        assert_eq!(second.data.stats.written(), 0);
        assert_eq!(second.data.retired, 0);
        assert!(second.data.changes.is_empty());
    }

    #[test]
    fn deleting_a_file_retires_its_facts() {
        let dir = workspace();
        let store = InMemoryKnowledgeStore::new();
        let cancel = CancellationToken::new();
        let metrics = RunMetrics::new();
        let scanner = scanner();
        scanner.scan("shop", dir.path(), &store, &cancel, &metrics).unwrap();

        fs::write(
            dir.path().join("Models/Shop.cs"),
            MODELS.replace("    public string Email { get; set; }\n", ""),
        )
        .unwrap();
        let rescan = scanner.scan("shop", dir.path(), &store, &cancel, &metrics).unwrap();
        assert_eq!(
            rescan.data.changes,
            vec![FileChange::new("Models/Shop.cs", ChangeKind::Modified)]
        );
        assert_eq!(rescan.data.files_analyzed, 1);
        assert_eq!(rescan.data.files_reused, 1);
        assert!(rescan.data.stats.updated >= 1);
        assert_eq!(rescan.data.integrity_violations, 0);

        fs::remove_file(dir.path().join("Models/Shop.cs")).unwrap();
        let rescan = scanner.scan("shop", dir.path(), &store, &cancel, &metrics).unwrap();
        assert!(rescan
            .data
            .changes
            .contains(&FileChange::new("Models/Shop.cs", ChangeKind::Deleted)));
        let active_types = store
            .active_facts("shop")
            .unwrap()
            .into_iter()
            .filter(|f| f.entity_type() == EntityType::CodeType)
            .count();
        assert_eq!(active_types, 0);
        assert!(rescan.data.retired >= 2);
        assert_eq!(rescan.data.integrity_violations, 0);
    }

    #[test]
    fn repository_without_database_usage_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Plain.cs"), "class Plain { public int X { get; set; } }").unwrap();
        let err = scanner()
            .scan("plain", dir.path(), &InMemoryKnowledgeStore::new(), &CancellationToken::new(), &RunMetrics::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Repository(RepositoryError::NoRelevantUsage { .. })));
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = scanner()
            .scan(
                "ghost",
                Path::new("/definitely/not/here"),
                &InMemoryKnowledgeStore::new(),
                &CancellationToken::new(),
                &RunMetrics::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Repository(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn cancelled_scan_stops() {
        let dir = workspace();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scanner()
            .scan("shop", dir.path(), &InMemoryKnowledgeStore::new(), &cancel, &RunMetrics::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
