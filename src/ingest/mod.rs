// src/ingest/mod.rs
pub mod providers;
pub mod retry;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::error::ConnectorError;
use crate::ingest::retry::{fetch_with_retry, RetryPolicy};
use crate::ingest::types::{Connector, RawRecord};
use crate::model::Source;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_records_total", "Raw records fetched per source.");
        describe_counter!(
            "ingest_connector_errors_total",
            "Connector fetches that failed after retries."
        );
        describe_counter!(
            "ingest_connector_retries_total",
            "Transient connector errors that were retried."
        );
        describe_histogram!("ingest_fetch_ms", "Connector fetch time in milliseconds.");
        describe_counter!("normalize_warnings_total", "Non-fatal normalization warnings.");
        describe_counter!("sync_cycles_total", "Sync cycles started.");
        describe_counter!("sync_failures_total", "Sync cycles that failed entirely.");
        describe_histogram!("sync_cycle_ms", "Sync cycle duration in milliseconds.");
        describe_gauge!("sync_tasks", "Merged tasks in the published snapshot.");
        describe_gauge!(
            "sync_last_success_ts",
            "Unix ts of the last published snapshot."
        );
    });
}

/// Outcome of one connector within a cycle.
#[derive(Debug)]
pub struct SourceFetch {
    pub source: Source,
    pub outcome: Result<Vec<RawRecord>, ConnectorError>,
    pub elapsed: Duration,
}

/// Fetch from every connector concurrently and join them all.
/// A failing connector never affects the others; results come back in
/// connector order.
pub async fn fetch_all(
    connectors: &[Arc<dyn Connector>],
    since: Option<DateTime<Utc>>,
    policy: RetryPolicy,
) -> Vec<SourceFetch> {
    ensure_metrics_described();

    let mut set = JoinSet::new();
    let mut task_ids = HashMap::new();
    for (idx, c) in connectors.iter().enumerate() {
        let c = Arc::clone(c);
        let handle = set.spawn(async move {
            let t0 = Instant::now();
            let outcome = fetch_with_retry(c.as_ref(), since, &policy).await;
            (idx, outcome, t0.elapsed())
        });
        task_ids.insert(handle.id(), idx);
    }

    let mut slots: Vec<Option<SourceFetch>> = connectors.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (idx, outcome, elapsed) = match joined {
            Ok(res) => res,
            Err(join_err) => {
                let Some(&idx) = task_ids.get(&join_err.id()) else {
                    continue;
                };
                let outcome = Err(ConnectorError::Aborted {
                    source_name: connectors[idx].source(),
                    message: join_err.to_string(),
                });
                (idx, outcome, Duration::ZERO)
            }
        };
        let source = connectors[idx].source();

        match &outcome {
            Ok(records) => {
                tracing::info!(%source, records = records.len(), elapsed_ms = elapsed.as_millis() as u64, "source fetched");
            }
            Err(e) => {
                tracing::warn!(%source, error = %e, "source degraded for this cycle");
                counter!("ingest_connector_errors_total", "source" => source.as_str()).increment(1);
            }
        }
        slots[idx] = Some(SourceFetch {
            source,
            outcome,
            elapsed,
        });
    }
    slots.into_iter().flatten().collect()
}
