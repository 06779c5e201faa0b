// src/sync/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sync::SyncEngine;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval_secs: u64,
    /// Fire immediately instead of waiting one full interval.
    pub run_on_start: bool,
}

/// Periodic trigger. Shares the engine's coalescing, so a tick landing on an
/// API-triggered cycle simply joins it.
pub fn spawn_scheduler(engine: Arc<SyncEngine>, cfg: SchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(cfg.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !cfg.run_on_start {
            // the first tick of `interval` completes immediately
            ticker.tick().await;
        }
        loop {
            ticker.tick().await;
            match engine.trigger().await {
                Ok(snapshot) => tracing::debug!(
                    target: "sync",
                    tasks = snapshot.all_tasks.len(),
                    "scheduled sync tick"
                ),
                Err(e) => tracing::debug!(target: "sync", error = %e, "scheduled sync tick failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::providers::fixture::FixtureConnector;
    use crate::model::Source;
    use crate::reconcile::links::LinkRule;
    use crate::reconcile::matcher::ExactKeyMatcher;
    use crate::reconcile::Reconciler;
    use crate::sync::SyncEngineBuilder;

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_snapshots() {
        let engine = SyncEngineBuilder::new(Reconciler::new(
            Source::ALL.to_vec(),
            Box::new(ExactKeyMatcher),
            LinkRule::defaults(),
        ))
        .connector(Arc::new(FixtureConnector::from_json(
            Source::Github,
            r#"[{"number": 1, "title": "A", "state": "open", "html_url": "https://github.com/o/r/issues/1"}]"#,
        )))
        .build();

        let handle = spawn_scheduler(
            Arc::clone(&engine),
            SchedulerCfg {
                interval_secs: 60,
                run_on_start: true,
            },
        );

        for _ in 0..50 {
            if engine.store().generation() >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.store().generation(), 1);
        assert_eq!(engine.store().current().all_tasks.len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..50 {
            if engine.store().generation() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.store().generation(), 2);
        handle.abort();
    }
}
