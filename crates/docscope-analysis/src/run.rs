//! Multi-repository runs.
//!
//! Repositories are scanned on a bounded pool. A repository that fails is
//! skipped and recorded; configuration errors, database connectivity
//! failures and cancellation stop the run. Live sampling starts once every
//! scan has finished and visits one repository at a time, so the database
//! never sees more than the sampler's own collection concurrency.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use docscope_core::config::DocscopeConfig;
use docscope_core::errors::{ConfigError, ErrorRecord, PipelineError, PipelineResult, ResourceError};
use docscope_core::model::{CodeType, CollectionMapping, Fact, ObservedSchema, SourceRevision};
use docscope_core::tracing::{Counter, RunMetrics, RunReport};
use docscope_core::traits::{Cancellable, KnowledgeStore, ReviewQueue, UpsertStats};
use rayon::prelude::*;

use crate::sampling::{DocumentSource, MongoSampler, SampleTarget};
use crate::scanner::{GitSourceControl, IncrementalScanner, ScanOutcome, SourceControl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub name: String,
    pub root: PathBuf,
}

impl RepositoryTarget {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Completed repositories, in target order.
    pub outcomes: Vec<ScanOutcome>,
    /// Repositories skipped after a repository-level failure.
    pub skipped: Vec<String>,
    pub schemas: UpsertStats,
    pub report: Option<RunReport>,
}

impl RunSummary {
    pub fn outcome(&self, repository: &str) -> Option<&ScanOutcome> {
        self.outcomes.iter().find(|o| o.repository == repository)
    }
}

/// Optional live-data collaborators of a run.
#[derive(Clone, Copy)]
pub struct Sampling<'a> {
    pub source: &'a dyn DocumentSource,
    pub queue: &'a dyn ReviewQueue,
}

pub struct RunCoordinator {
    config: DocscopeConfig,
    scanner: IncrementalScanner,
    sampler: MongoSampler,
}

impl RunCoordinator {
    /// Validates `config` before anything else happens.
    pub fn new(config: DocscopeConfig) -> Result<Self, ConfigError> {
        Self::with_source_control(config, Arc::new(GitSourceControl))
    }

    pub fn with_source_control(
        config: DocscopeConfig,
        source_control: Arc<dyn SourceControl>,
    ) -> Result<Self, ConfigError> {
        DocscopeConfig::validate(&config)?;
        Ok(Self {
            scanner: IncrementalScanner::new(&config, source_control),
            sampler: MongoSampler::new(&config.sampling, &config.pii),
            config,
        })
    }

    pub fn config(&self) -> &DocscopeConfig {
        &self.config
    }

    /// Scan every target and, when `sampling` is given, sample the collections
    /// each completed repository maps to.
    pub fn run(
        &self,
        targets: &[RepositoryTarget],
        store: &dyn KnowledgeStore,
        sampling: Option<Sampling<'_>>,
        cancel: &(dyn Cancellable + Sync),
        metrics: &RunMetrics,
    ) -> Result<PipelineResult<RunSummary>, PipelineError> {
        tracing::info!(run_id = %metrics.run_id(), repositories = targets.len(), "run started");
        let threads = self.config.scan.effective_max_concurrent_repositories().max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ResourceError::WorkerPool { message: e.to_string() })?;

        let outcomes: Vec<Result<PipelineResult<ScanOutcome>, PipelineError>> = pool.install(|| {
            targets
                .par_iter()
                .map(|target| {
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    let outcome = metrics.time("scan", || {
                        self.scanner.scan(&target.name, &target.root, store, cancel, metrics)
                    });
                    if outcome.as_ref().is_err_and(PipelineError::aborts_run) {
                        cancel.cancel();
                    }
                    outcome
                })
                .collect()
        });

        let mut result = PipelineResult::<RunSummary>::default();
        let mut abort: Option<PipelineError> = None;
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(scan) => {
                    for e in scan.errors {
                        metrics.record_error(
                            ErrorRecord::new("scan", &e).with_context("repository", &target.name),
                        );
                        result.add_error(e);
                    }
                    result.data.outcomes.push(scan.data);
                }
                Err(e) if e.aborts_run() => {
                    // The first aborting error is the cause; later ones are
                    // usually cancellations it triggered.
                    if abort.as_ref().map_or(true, |a| matches!(a, PipelineError::Cancelled)) {
                        abort = Some(e);
                    }
                }
                Err(e) => {
                    tracing::warn!(repository = %target.name, error = %e, "repository skipped");
                    metrics.incr(Counter::RepositoriesSkipped);
                    metrics.record_error(
                        ErrorRecord::new("scan", &e).with_context("repository", &target.name),
                    );
                    result.data.skipped.push(target.name.clone());
                    result.add_error(e);
                }
            }
        }
        if abort.is_none() {
            if let Some(sampling) = sampling.filter(|_| self.config.sampling.effective_enabled()) {
                if let Err(e) = self.sample_outcomes(&mut result, store, sampling, cancel, metrics) {
                    abort = Some(e);
                }
            }
        }
        if let Some(e) = abort {
            tracing::error!(error = %e, "run aborted");
            metrics.record_error(ErrorRecord::new("run", &e));
            return Err(e);
        }

        let report = metrics.report();
        tracing::info!(
            run_id = %report.run_id,
            scanned = report.counter(Counter::RepositoriesScanned),
            skipped = report.counter(Counter::RepositoriesSkipped),
            errors = report.errors.len(),
            "run finished"
        );
        result.data.report = Some(report);
        Ok(result)
    }

    /// Sample the collections of every completed repository, in target
    /// order. An aborting error is returned; any other sampling failure is
    /// recorded against its repository.
    fn sample_outcomes(
        &self,
        result: &mut PipelineResult<RunSummary>,
        store: &dyn KnowledgeStore,
        sampling: Sampling<'_>,
        cancel: &(dyn Cancellable + Sync),
        metrics: &RunMetrics,
    ) -> Result<(), PipelineError> {
        let mut stats = UpsertStats::default();
        let mut errors = Vec::new();
        for outcome in &result.data.outcomes {
            let Some(revision) = outcome.revision.as_ref() else {
                continue;
            };
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let sampled = metrics.time("sampling", || {
                self.sample_repository(&outcome.repository, revision, store, sampling, cancel, metrics)
            });
            match sampled {
                Ok(schemas) => {
                    stats.merge(schemas.data);
                    errors.extend(schemas.errors.into_iter().map(|e| (outcome.repository.clone(), e)));
                }
                Err(e) if e.aborts_run() => return Err(e),
                Err(e) => {
                    tracing::warn!(repository = %outcome.repository, error = %e, "sampling failed");
                    errors.push((outcome.repository.clone(), e));
                }
            }
        }
        for (repository, e) in errors {
            metrics.record_error(ErrorRecord::new("sampling", &e).with_context("repository", &repository));
            result.add_error(e);
        }
        result.data.schemas.merge(stats);
        Ok(())
    }

    fn sample_repository(
        &self,
        repository: &str,
        revision: &SourceRevision,
        store: &dyn KnowledgeStore,
        sampling: Sampling<'_>,
        cancel: &(dyn Cancellable + Sync),
        metrics: &RunMetrics,
    ) -> Result<PipelineResult<UpsertStats>, PipelineError> {
        let mut types: Vec<CodeType> = Vec::new();
        let mut mappings: Vec<CollectionMapping> = Vec::new();
        for fact in store.active_facts(repository)? {
            match fact {
                Fact::CodeType(t) => types.push(t),
                Fact::CollectionMapping(m) => mappings.push(m),
                _ => {}
            }
        }
        let targets = SampleTarget::for_mappings(&mappings, &types);
        let sampled = self.sampler.sample_collections(
            sampling.source,
            &targets,
            revision,
            sampling.queue,
            cancel,
            metrics,
        )?;

        let mut result = PipelineResult::<UpsertStats>::default();
        for e in sampled.errors {
            result.add_error(e);
        }
        let schemas: Vec<Fact> = sampled.data.into_iter().map(Fact::from).collect();
        if !schemas.is_empty() {
            result.data = self
                .scanner
                .writer()
                .write(store, schemas, Utc::now(), metrics)?;
        }
        Ok(result)
    }
}

/// Observed schemas currently active for `repository`.
pub fn active_schemas(store: &dyn KnowledgeStore, repository: &str) -> Result<Vec<ObservedSchema>, PipelineError> {
    Ok(store
        .active_facts(repository)?
        .into_iter()
        .filter_map(|f| match f {
            Fact::ObservedSchema(s) => Some(s),
            _ => None,
        })
        .collect())
}
