// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod score;
pub mod store;
pub mod sync;

pub use crate::api::{router, AppState};
pub use crate::config::Settings;
pub use crate::model::{Source, SyncStatus, Task, TaskComparison, TaskStatus};
pub use crate::sync::{SyncEngine, SyncEngineBuilder};

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::providers::{fixture::FixtureConnector, github::GithubConnector, notion::NotionConnector};
use crate::ingest::retry::RetryPolicy;
use crate::normalize::NormalizeOptions;
use crate::reconcile::Reconciler;

/// Wire connectors, reconciler and scorer from settings.
/// A source with credentials gets a live connector; `[[fixtures]]` add replay connectors.
pub fn build_engine(settings: &Settings) -> Result<Arc<SyncEngine>> {
    let timeout = Duration::from_secs(settings.sync.request_timeout_secs.max(1));
    let reconciler = Reconciler::from_settings(&settings.reconcile).context("building reconciler")?;

    let mut builder = SyncEngineBuilder::new(reconciler)
        .normalize_options(NormalizeOptions::from_settings(settings))
        .weights(settings.scoring.clone())
        .retry(RetryPolicy::from_settings(&settings.sync));

    if let Some(gh) = &settings.github {
        let c = GithubConnector::new(gh, timeout).context("building github connector")?;
        builder = builder.connector(Arc::new(c));
        tracing::info!(owner = %gh.owner, repo = %gh.repo, "github source enabled");
    }
    if let Some(nt) = &settings.notion {
        let c = NotionConnector::new(nt, timeout).context("building notion connector")?;
        builder = builder.connector(Arc::new(c));
        tracing::info!(database = %nt.database_id, "notion source enabled");
    }
    for f in &settings.fixtures {
        builder = builder.connector(Arc::new(FixtureConnector::from_path(f.source, &f.path)));
        tracing::info!(source = %f.source, path = %f.path.display(), "fixture source enabled");
    }

    let engine = builder.build();
    if engine.sources().is_empty() {
        tracing::warn!("no sources configured; set GITHUB_TOKEN/GITHUB_REPO or NOTION_TOKEN/NOTION_DATABASE_ID");
    }
    Ok(engine)
}
