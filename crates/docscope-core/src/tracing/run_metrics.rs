//! Per-run counters and timers.
//!
//! A [`RunMetrics`] is created for each run and passed by reference through
//! the pipeline. Nothing here is global, so concurrent runs never share
//! counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ErrorRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    RepositoriesScanned,
    RepositoriesSkipped,
    FilesDiscovered,
    FilesAnalyzed,
    FilesFromSnapshot,
    FilesSkipped,
    TypesExtracted,
    MappingsResolved,
    OperationsExtracted,
    RelationshipsInferred,
    CollectionsSampled,
    DocumentsSampled,
    PiiDetections,
    ReviewQueued,
    EntriesInserted,
    EntriesUpdated,
    EntriesUnchanged,
    EntriesRetired,
    IntegrityViolations,
}

const COUNTER_COUNT: usize = 19;

impl Counter {
    const ALL: [Counter; COUNTER_COUNT] = [
        Self::RepositoriesScanned,
        Self::RepositoriesSkipped,
        Self::FilesDiscovered,
        Self::FilesAnalyzed,
        Self::FilesFromSnapshot,
        Self::FilesSkipped,
        Self::TypesExtracted,
        Self::MappingsResolved,
        Self::OperationsExtracted,
        Self::RelationshipsInferred,
        Self::CollectionsSampled,
        Self::DocumentsSampled,
        Self::PiiDetections,
        Self::ReviewQueued,
        Self::EntriesInserted,
        Self::EntriesUpdated,
        Self::EntriesUnchanged,
        Self::EntriesRetired,
        Self::IntegrityViolations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RepositoriesScanned => "repositories_scanned",
            Self::RepositoriesSkipped => "repositories_skipped",
            Self::FilesDiscovered => "files_discovered",
            Self::FilesAnalyzed => "files_analyzed",
            Self::FilesFromSnapshot => "files_from_snapshot",
            Self::FilesSkipped => "files_skipped",
            Self::TypesExtracted => "types_extracted",
            Self::MappingsResolved => "mappings_resolved",
            Self::OperationsExtracted => "operations_extracted",
            Self::RelationshipsInferred => "relationships_inferred",
            Self::CollectionsSampled => "collections_sampled",
            Self::DocumentsSampled => "documents_sampled",
            Self::PiiDetections => "pii_detections",
            Self::ReviewQueued => "review_queued",
            Self::EntriesInserted => "entries_inserted",
            Self::EntriesUpdated => "entries_updated",
            Self::EntriesUnchanged => "entries_unchanged",
            Self::EntriesRetired => "entries_retired",
            Self::IntegrityViolations => "integrity_violations",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
pub struct RunMetrics {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    counters: [AtomicU64; COUNTER_COUNT],
    phases: Mutex<BTreeMap<String, Duration>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            phases: Mutex::new(BTreeMap::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.counters[counter.index()].fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Accumulate wall time under a phase name.
    pub fn record_phase(&self, phase: &str, elapsed: Duration) {
        if let Ok(mut phases) = self.phases.lock() {
            *phases.entry(phase.to_string()).or_default() += elapsed;
        }
    }

    /// Run `f`, timing it as `phase`.
    pub fn time<T>(&self, phase: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record_phase(phase, start.elapsed());
        out
    }

    pub fn record_error(&self, record: ErrorRecord) {
        tracing::warn!(
            error_id = %record.id,
            code = %record.code,
            operation = %record.operation,
            "{}",
            record.message
        );
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(record);
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            counters: Counter::ALL
                .iter()
                .map(|c| (c.name().to_string(), self.get(*c)))
                .collect(),
            phases_ms: self
                .phases
                .lock()
                .map(|p| {
                    p.iter()
                        .map(|(k, v)| (k.clone(), v.as_millis() as u64))
                        .collect()
                })
                .unwrap_or_default(),
            errors: self.errors.lock().map(|e| e.clone()).unwrap_or_default(),
        }
    }
}

/// End-of-run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: BTreeMap<String, u64>,
    pub phases_ms: BTreeMap<String, u64>,
    pub errors: Vec<ErrorRecord>,
}

impl RunReport {
    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(counter.name()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_runs_do_not_share_counters() {
        let a = RunMetrics::new();
        let b = RunMetrics::new();
        a.add(Counter::FilesAnalyzed, 3);
        b.incr(Counter::FilesAnalyzed);
        assert_eq!(a.get(Counter::FilesAnalyzed), 3);
        assert_eq!(b.get(Counter::FilesAnalyzed), 1);
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn report_includes_every_counter_and_phase() {
        let m = RunMetrics::new();
        m.time("analysis", || std::thread::sleep(Duration::from_millis(2)));
        m.incr(Counter::EntriesInserted);
        let report = m.report();
        assert_eq!(report.counters.len(), COUNTER_COUNT);
        assert_eq!(report.counter(Counter::EntriesInserted), 1);
        assert!(report.phases_ms.contains_key("analysis"));
    }
}
