// src/store.rs
//! Latest published snapshot plus the sync health record.
//!
//! Readers clone an `Arc` under a read lock held only for the clone; a
//! publish swaps the pointer. Health (last attempt / last error / phase)
//! lives beside the snapshot so a failed cycle never touches what readers see.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::SyncError;
use crate::model::{SyncStatus, TaskComparison};

/// Where the orchestrator currently is within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Fetching,
    Normalizing,
    Reconciling,
    Scoring,
    Publishing,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Normalizing => "normalizing",
            SyncPhase::Reconciling => "reconciling",
            SyncPhase::Scoring => "scoring",
            SyncPhase::Publishing => "publishing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default)]
struct Health {
    last_attempt: Option<DateTime<Utc>>,
    last_error: Option<String>,
    phase: SyncPhase,
    cycles: u64,
}

/// `SyncStatus` as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub sync_status: SyncStatus,
    pub phase: SyncPhase,
    pub generation: u64,
    pub cycles: u64,
}

struct Published {
    generation: u64,
    snapshot: Arc<TaskComparison>,
}

pub struct SnapshotStore {
    published: RwLock<Published>,
    health: RwLock<Health>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Starts with an empty comparison at generation 0.
    pub fn new() -> Self {
        Self::with_snapshot(TaskComparison::default())
    }

    pub fn with_snapshot(initial: TaskComparison) -> Self {
        Self {
            published: RwLock::new(Published {
                generation: 0,
                snapshot: Arc::new(initial),
            }),
            health: RwLock::new(Health::default()),
        }
    }

    pub fn current(&self) -> Arc<TaskComparison> {
        Arc::clone(&self.published.read().snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.published.read().generation
    }

    /// Swap in `snapshot` if `generation` is newer than what is published.
    pub fn publish(&self, generation: u64, snapshot: Arc<TaskComparison>) -> Result<(), SyncError> {
        {
            let mut guard = self.published.write();
            if generation <= guard.generation {
                return Err(SyncError::Publish {
                    attempted: generation,
                    current: guard.generation,
                });
            }
            guard.generation = generation;
            guard.snapshot = snapshot;
        }
        self.health.write().last_error = None;
        Ok(())
    }

    pub fn begin_attempt(&self, at: DateTime<Utc>) {
        let mut h = self.health.write();
        h.last_attempt = Some(at);
        h.cycles += 1;
    }

    pub fn record_failure(&self, err: &SyncError) {
        self.health.write().last_error = Some(err.to_string());
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.health.write().phase = phase;
    }

    pub fn phase(&self) -> SyncPhase {
        self.health.read().phase
    }

    /// Published sync status overlaid with the live health record.
    pub fn status(&self) -> StatusReport {
        let (snapshot, generation) = {
            let p = self.published.read();
            (Arc::clone(&p.snapshot), p.generation)
        };
        let h = self.health.read().clone();

        let mut sync_status = snapshot.sync_status.clone();
        sync_status.last_attempt = h.last_attempt;
        sync_status.last_error = h.last_error;
        StatusReport {
            sync_status,
            phase: h.phase,
            generation,
            cycles: h.cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(last_sync: DateTime<Utc>) -> Arc<TaskComparison> {
        Arc::new(TaskComparison {
            sync_status: SyncStatus {
                last_sync: Some(last_sync),
                ..SyncStatus::default()
            },
            ..TaskComparison::default()
        })
    }

    #[test]
    fn stale_generation_is_rejected() {
        let store = SnapshotStore::new();
        let t = Utc::now();
        store.publish(2, snapshot(t)).unwrap();
        let err = store.publish(1, snapshot(t)).unwrap_err();
        assert_eq!(err, SyncError::Publish { attempted: 1, current: 2 });
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn failure_keeps_snapshot_and_shows_in_status() {
        let store = SnapshotStore::new();
        let t = Utc::now();
        store.publish(1, snapshot(t)).unwrap();
        let before = store.current();

        store.begin_attempt(Utc::now());
        store.record_failure(&SyncError::AllSourcesFailed("github: boom".into()));

        assert!(Arc::ptr_eq(&before, &store.current()));
        let status = store.status();
        assert_eq!(status.sync_status.last_sync, Some(t));
        assert!(status.sync_status.last_error.unwrap().contains("boom"));
        assert!(store.current().sync_status.last_error.is_none());
    }

    #[test]
    fn successful_publish_clears_error() {
        let store = SnapshotStore::new();
        store.record_failure(&SyncError::NoSources);
        store.publish(1, snapshot(Utc::now())).unwrap();
        assert!(store.status().sync_status.last_error.is_none());
    }

    #[test]
    fn status_serializes_flat() {
        let store = SnapshotStore::new();
        store.set_phase(SyncPhase::Fetching);
        let v = serde_json::to_value(store.status()).unwrap();
        assert_eq!(v["phase"], "fetching");
        assert!(v.get("total_tasks_by_source").is_some());
        assert!(v["last_sync"].is_null());
    }
}
