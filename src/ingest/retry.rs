// src/ingest/retry.rs
//! Per-connector retry with exponential backoff.
//!
//! Transient errors are retried up to `max_retries` times; the wait doubles
//! from `initial_backoff` and is capped by `max_backoff`. A rate-limit hint
//! from the source replaces the computed wait (still capped).

use chrono::{DateTime, Utc};
use metrics::counter;
use std::time::Duration;

use crate::config::SyncSettings;
use crate::error::ConnectorError;
use crate::ingest::types::{Connector, RawRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(s: &SyncSettings) -> Self {
        Self {
            max_retries: s.max_retries,
            initial_backoff: Duration::from_millis(s.initial_backoff_ms),
            max_backoff: Duration::from_millis(s.max_backoff_ms),
        }
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = self
            .initial_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        hint.unwrap_or(computed).min(self.max_backoff)
    }
}

pub async fn fetch_with_retry(
    connector: &dyn Connector,
    since: Option<DateTime<Utc>>,
    policy: &RetryPolicy,
) -> Result<Vec<RawRecord>, ConnectorError> {
    let source = connector.source();
    let mut attempt: u32 = 0;
    loop {
        match connector.fetch(since).await {
            Ok(records) => return Ok(records),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let wait = policy.delay_for(attempt, e.retry_after());
                counter!("ingest_connector_retries_total", "source" => source.as_str()).increment(1);
                tracing::warn!(
                    %source,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "transient fetch error, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}
