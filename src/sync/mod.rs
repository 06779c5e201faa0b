// src/sync/mod.rs
//! # Sync Orchestrator
//! One cycle: fetch → normalize → reconcile → score → publish.
//!
//! At most one cycle runs at a time. Triggers arriving while a cycle is in
//! flight subscribe to that cycle's outcome instead of starting another.
//! The cycle itself runs on its own task, so a caller that stops waiting
//! never cancels it.

pub mod scheduler;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::error::SyncError;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::types::{Connector, RawRecord};
use crate::ingest::{ensure_metrics_described, fetch_all};
use crate::model::{Source, SourceRecord, SourceRef, SyncStatus, TaskComparison};
use crate::normalize::{normalize, NormalizeOptions};
use crate::reconcile::Reconciler;
use crate::score::{score_all, ScoringWeights};
use crate::store::{SnapshotStore, SyncPhase};

pub type CycleOutcome = Result<Arc<TaskComparison>, SyncError>;

type InFlight = watch::Receiver<Option<CycleOutcome>>;

pub struct SyncEngine {
    connectors: Vec<Arc<dyn Connector>>,
    sources: Vec<Source>,
    normalize: NormalizeOptions,
    reconciler: Reconciler,
    weights: ScoringWeights,
    retry: RetryPolicy,
    store: Arc<SnapshotStore>,
    generation: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
}

pub struct SyncEngineBuilder {
    connectors: Vec<Arc<dyn Connector>>,
    normalize: NormalizeOptions,
    reconciler: Reconciler,
    weights: ScoringWeights,
    retry: RetryPolicy,
    store: Option<Arc<SnapshotStore>>,
}

impl SyncEngineBuilder {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            connectors: Vec::new(),
            normalize: NormalizeOptions::default(),
            reconciler,
            weights: ScoringWeights::default(),
            retry: RetryPolicy::default(),
            store: None,
        }
    }

    pub fn connector(mut self, c: Arc<dyn Connector>) -> Self {
        self.connectors.push(c);
        self
    }

    pub fn normalize_options(mut self, opts: NormalizeOptions) -> Self {
        self.normalize = opts;
        self
    }

    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(mut self, store: Arc<SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Arc<SyncEngine> {
        let mut sources: Vec<Source> = self.connectors.iter().map(|c| c.source()).collect();
        sources.sort();
        sources.dedup();
        Arc::new(SyncEngine {
            connectors: self.connectors,
            sources,
            normalize: self.normalize,
            reconciler: self.reconciler,
            weights: self.weights,
            retry: self.retry,
            store: self.store.unwrap_or_default(),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        })
    }
}

impl SyncEngine {
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Start a cycle, or join the one in flight, and wait for its outcome.
    pub async fn trigger(self: &Arc<Self>) -> CycleOutcome {
        let mut rx = self.join_or_start();
        // clone out of the watch::Ref before `rx` goes out of scope
        let outcome: Option<CycleOutcome> = match rx.wait_for(Option::is_some).await {
            Ok(seen) => (*seen).clone(),
            Err(_) => return Err(SyncError::Aborted("cycle task dropped".into())),
        };
        outcome.unwrap_or_else(|| Err(SyncError::Aborted("cycle finished without an outcome".into())))
    }

    fn join_or_start(self: &Arc<Self>) -> InFlight {
        let mut slot = self.in_flight.lock();
        if let Some(rx) = slot.as_ref() {
            tracing::debug!("joining in-flight sync cycle");
            return rx.clone();
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        drop(slot);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let worker = Arc::clone(&engine);
            let outcome = match tokio::spawn(async move { worker.run_cycle().await }).await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let err = SyncError::Aborted(join_err.to_string());
                    engine.store.record_failure(&err);
                    engine.store.set_phase(SyncPhase::Idle);
                    tracing::error!(error = %err, "sync cycle task died");
                    Err(err)
                }
            };
            engine.in_flight.lock().take();
            let _ = tx.send(Some(outcome));
        });
        rx
    }

    async fn run_cycle(&self) -> CycleOutcome {
        ensure_metrics_described();
        let t0 = Instant::now();
        let now = Utc::now();
        let cycle = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        counter!("sync_cycles_total").increment(1);
        self.store.begin_attempt(now);
        tracing::info!(cycle, "sync cycle started");

        let outcome = self.cycle(cycle, now).await;
        self.store.set_phase(SyncPhase::Idle);
        histogram!("sync_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match &outcome {
            Ok(snapshot) => {
                gauge!("sync_tasks").set(snapshot.all_tasks.len() as f64);
                gauge!("sync_last_success_ts").set(now.timestamp() as f64);
                tracing::info!(
                    cycle,
                    tasks = snapshot.all_tasks.len(),
                    degraded = snapshot.sync_status.degraded_sources.len(),
                    warnings = snapshot.sync_status.warnings,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "sync cycle published"
                );
            }
            Err(e) => {
                counter!("sync_failures_total").increment(1);
                self.store.record_failure(e);
                tracing::error!(cycle, error = %e, "sync cycle failed; previous snapshot kept");
            }
        }
        outcome
    }

    async fn cycle(&self, cycle: u64, now: DateTime<Utc>) -> CycleOutcome {
        if self.connectors.is_empty() {
            return Err(SyncError::NoSources);
        }

        self.store.set_phase(SyncPhase::Fetching);
        let fetched = fetch_all(&self.connectors, None, self.retry).await;

        let mut totals: BTreeMap<Source, usize> = self.sources.iter().map(|s| (*s, 0)).collect();
        let mut fetched_ok = BTreeSet::new();
        let mut failed = BTreeSet::new();
        let mut failures = Vec::new();
        let mut raw = Vec::new();
        for f in fetched {
            match f.outcome {
                Ok(records) => {
                    fetched_ok.insert(f.source);
                    *totals.entry(f.source).or_default() += records.len();
                    raw.extend(records);
                }
                Err(e) => {
                    failed.insert(f.source);
                    failures.push(e.to_string());
                }
            }
        }
        if fetched_ok.is_empty() {
            return Err(SyncError::AllSourcesFailed(failures.join("; ")));
        }
        // a source is degraded only when none of its connectors delivered
        let degraded: BTreeSet<Source> = failed.difference(&fetched_ok).copied().collect();

        self.store.set_phase(SyncPhase::Normalizing);
        let (records, warnings) = self.normalize_all(raw);

        self.store.set_phase(SyncPhase::Reconciling);
        let mut tasks = self.reconciler.reconcile(&records)?;

        self.store.set_phase(SyncPhase::Scoring);
        score_all(&mut tasks, now, &self.weights);

        self.store.set_phase(SyncPhase::Publishing);
        let status = SyncStatus {
            total_tasks_by_source: totals,
            last_sync: Some(now),
            degraded_sources: degraded,
            warnings,
            last_attempt: None,
            last_error: None,
        };
        let snapshot = Arc::new(TaskComparison::assemble(tasks, &self.sources, status));
        self.store.publish(cycle, Arc::clone(&snapshot))?;
        Ok(snapshot)
    }

    /// Normalize every raw record; duplicate `(source, source_id)` pairs keep
    /// the most recently updated record. Returns the warning count.
    fn normalize_all(&self, raw: Vec<RawRecord>) -> (Vec<SourceRecord>, usize) {
        let mut warnings = 0usize;
        let mut by_key: HashMap<SourceRef, SourceRecord> = HashMap::with_capacity(raw.len());

        for r in raw {
            let (record, ws) = normalize(r, &self.normalize);
            for w in &ws {
                tracing::warn!(source = %w.source, source_id = %w.source_id, "{}", w.message);
                counter!("normalize_warnings_total", "source" => w.source.as_str()).increment(1);
            }
            warnings += ws.len();

            let key = record.key();
            match by_key.get(&key) {
                Some(existing) if existing.updated_at >= record.updated_at => {
                    tracing::warn!(source = %key.source, source_id = %key.source_id, "duplicate record dropped");
                    warnings += 1;
                }
                Some(_) => {
                    tracing::warn!(source = %key.source, source_id = %key.source_id, "duplicate record replaced by newer copy");
                    warnings += 1;
                    by_key.insert(key, record);
                }
                None => {
                    by_key.insert(key, record);
                }
            }
        }
        (by_key.into_values().collect(), warnings)
    }
}
