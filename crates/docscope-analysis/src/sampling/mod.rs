//! Read-only document sampling: observed schemas per mapped collection.
//!
//! Each primary mapping with a resolved collection name is sampled at most
//! once per run. Documents are folded into a [`SchemaAccumulator`], compared
//! against the mapped code type for drift, then passed through PII detection
//! before the schema leaves this module. Raw values of PII fields never do.

pub mod drift;
pub mod formats;
pub mod kinds;
#[cfg(feature = "mongodb-driver")]
pub mod mongo;
pub mod schema;
pub mod source;

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use chrono::Utc;
use docscope_core::config::{PiiConfig, SamplingConfig};
use docscope_core::errors::{PiiError, PipelineResult, SamplingError};
use docscope_core::model::{
    CodeType, CollectionMapping, EntityId, EntityRef, EntityType, ObservedSchema, SamplingSnapshot,
    SourceRevision,
};
use docscope_core::tracing::{Counter, RunMetrics};
use docscope_core::traits::{Cancellable, ReviewQueue};
use docscope_core::types::FxHashMap;
use rayon::prelude::*;

use crate::pii::PiiDetector;

pub use drift::compute_drift;
#[cfg(feature = "mongodb-driver")]
pub use mongo::MongoSource;
pub use schema::{SampledShape, SchemaAccumulator};
pub use source::{DocumentSource, InMemorySource, JsonDirectorySource};

/// One collection to sample and the code type it should match.
#[derive(Debug, Clone, Copy)]
pub struct SampleTarget<'a> {
    pub mapping: &'a CollectionMapping,
    pub code_type: Option<&'a CodeType>,
}

impl<'a> SampleTarget<'a> {
    /// Primary mappings with a resolved collection name, paired with their
    /// code type when it is among `types`.
    pub fn for_mappings(mappings: &'a [CollectionMapping], types: &'a [CodeType]) -> Vec<Self> {
        let by_id: FxHashMap<&EntityId, &CodeType> = types.iter().map(|t| (&t.id, t)).collect();
        mappings
            .iter()
            .filter(|m| m.is_primary && m.collection_name.is_some())
            .map(|mapping| SampleTarget {
                mapping,
                code_type: mapping.code_type.as_ref().and_then(|r| by_id.get(&r.id).copied()),
            })
            .collect()
    }

    fn collection(&self) -> &'a str {
        self.mapping.collection_name.as_deref().unwrap_or_default()
    }
}

/// Result of sampling one collection.
struct Sampled {
    schema: ObservedSchema,
    errors: Vec<PiiError>,
    skipped: u64,
}

pub struct MongoSampler {
    config: SamplingConfig,
    detector: PiiDetector,
}

impl MongoSampler {
    pub fn new(config: &SamplingConfig, pii: &PiiConfig) -> Self {
        Self {
            config: config.clone(),
            detector: PiiDetector::new(pii),
        }
    }

    /// Sample every distinct target collection.
    ///
    /// Connectivity failures, timeouts and cancellation abort and return
    /// `Err`. Per-collection problems (undecodable documents, PII rule
    /// failures) are collected in the result next to the schemas that did
    /// succeed.
    pub fn sample_collections(
        &self,
        source: &dyn DocumentSource,
        targets: &[SampleTarget<'_>],
        revision: &SourceRevision,
        queue: &dyn ReviewQueue,
        cancel: &(dyn Cancellable + Sync),
        metrics: &RunMetrics,
    ) -> Result<PipelineResult<Vec<ObservedSchema>>, SamplingError> {
        let mut result = PipelineResult::<Vec<ObservedSchema>>::default();
        if !self.config.effective_enabled() || targets.is_empty() {
            return Ok(result);
        }
        source.ping()?;
        let targets = dedup_targets(targets);
        tracing::info!(
            endpoint = %source.endpoint(),
            collections = targets.len(),
            "sampling collections"
        );

        let run = || {
            targets
                .par_iter()
                .map(|target| self.sample_one(source, target, revision, queue, cancel, metrics))
                .collect::<Vec<_>>()
        };
        let threads = self.config.effective_max_concurrent_collections().max(1);
        let outcomes = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                tracing::warn!(error = %e, "sampling pool unavailable, using global pool");
                run()
            }
        };

        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(Some(sampled)) => {
                    if sampled.skipped > 0 {
                        result.add_error(SamplingError::InvalidDocument {
                            collection: target.collection().to_string(),
                            message: format!("{} non-document values skipped", sampled.skipped),
                        });
                    }
                    for e in sampled.errors {
                        result.add_error(e);
                    }
                    result.data.push(sampled.schema);
                }
                Ok(None) => {}
                Err(e) if e.aborts_run() || matches!(e, SamplingError::Cancelled) => return Err(e),
                Err(e) => {
                    tracing::warn!(collection = target.collection(), error = %e, "collection sampling failed");
                    result.add_error(e);
                }
            }
        }
        Ok(result)
    }

    fn sample_one(
        &self,
        source: &dyn DocumentSource,
        target: &SampleTarget<'_>,
        revision: &SourceRevision,
        queue: &dyn ReviewQueue,
        cancel: &(dyn Cancellable + Sync),
        metrics: &RunMetrics,
    ) -> Result<Option<Sampled>, SamplingError> {
        let collection = target.collection();
        let timeout_ms = self.config.effective_operation_timeout_ms();
        let timeout = Duration::from_millis(timeout_ms);
        let started = Instant::now();
        let mut accumulator = SchemaAccumulator::new(&self.config);
        let mut skipped = 0u64;
        let mut stopped: Option<SamplingError> = None;

        source.sample(collection, self.config.effective_sample_size(), &mut |doc| {
            if cancel.is_cancelled() {
                stopped = Some(SamplingError::Cancelled);
                return ControlFlow::Break(());
            }
            if started.elapsed() >= timeout {
                stopped = Some(SamplingError::Timeout {
                    collection: collection.to_string(),
                    timeout_ms,
                });
                return ControlFlow::Break(());
            }
            if kinds::is_document(&doc) {
                accumulator.add(&doc);
            } else {
                skipped += 1;
            }
            ControlFlow::Continue(())
        })?;
        if let Some(e) = stopped {
            return Err(e);
        }
        if accumulator.documents() == 0 {
            tracing::debug!(collection, "collection is empty, no schema recorded");
            return Ok(None);
        }

        let shape = accumulator.finish();
        let mapping = target.mapping;
        let file = &mapping.provenance.file_path;
        let drift = target
            .code_type
            .map(|ty| compute_drift(ty, &shape.field_types))
            .unwrap_or_default();
        let mut schema = ObservedSchema {
            id: EntityId::derive(EntityType::ObservedSchema, &revision.repository, file, collection, ""),
            collection_mapping: EntityRef::new(EntityType::CollectionMapping, mapping.id.clone()),
            collection_name: collection.to_string(),
            json_schema: shape.json_schema,
            field_types: shape.field_types,
            required_fields: shape.required_fields,
            string_formats: shape.string_formats,
            enum_candidates: shape.enum_candidates,
            sample_size: shape.documents,
            pii_redacted: false,
            pii_detections: Vec::new(),
            snapshot: SamplingSnapshot {
                endpoint: source.endpoint(),
                database: source.database().or_else(|| self.config.database.clone()),
                strategy: source.strategy().to_string(),
                sample_size_limit: self.config.effective_sample_size(),
                max_examples: self.config.effective_max_examples(),
                enum_min_distinct: self.config.effective_enum_min_distinct(),
                enum_max_distinct: self.config.effective_enum_max_distinct(),
                enum_good_candidate_max: self.config.effective_enum_good_candidate_max(),
                sampled_at: Utc::now(),
            },
            drift,
            provenance: revision.provenance(file, collection, mapping.provenance.line_span),
        };
        let errors = self.detector.apply(&mut schema, &shape.strings, queue);

        let queued = schema.pii_detections.iter().filter(|d| d.queued_for_review).count() as u64;
        metrics.incr(Counter::CollectionsSampled);
        metrics.add(Counter::DocumentsSampled, schema.sample_size);
        metrics.add(Counter::PiiDetections, schema.pii_detections.len() as u64);
        metrics.add(Counter::ReviewQueued, queued);
        tracing::debug!(
            collection,
            documents = schema.sample_size,
            fields = schema.field_types.len(),
            pii = schema.pii_detections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collection sampled"
        );
        Ok(Some(Sampled { schema, errors, skipped }))
    }
}

/// One target per collection name, first seen wins unless a later one
/// carries the code type the first lacks.
fn dedup_targets<'a>(targets: &[SampleTarget<'a>]) -> Vec<SampleTarget<'a>> {
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut out: Vec<SampleTarget<'a>> = Vec::new();
    for target in targets.iter().filter(|t| t.mapping.collection_name.is_some()) {
        match index.get(target.collection()) {
            Some(&i) => {
                if out[i].code_type.is_none() && target.code_type.is_some() {
                    out[i] = *target;
                }
            }
            None => {
                index.insert(target.collection(), out.len());
                out.push(*target);
            }
        }
    }
    out
}
