//! Task Sync binary entrypoint.
//! Loads settings, starts the periodic sync and serves the HTTP API.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use task_sync::api::{self, AppState};
use task_sync::metrics::Metrics;
use task_sync::sync::scheduler::{spawn_scheduler, SchedulerCfg};
use task_sync::{build_engine, Settings};

/// `RUST_LOG` wins; otherwise our crate at info. `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("task_sync=info,tower_http=warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::load().context("loading settings")?;
    let engine = build_engine(&settings)?;

    let metrics = Metrics::init(settings.sync.interval_secs)?;
    let state = AppState::new(engine.clone(), &settings.server).with_metrics(metrics);
    let app = api::router(state);

    let _scheduler = spawn_scheduler(
        engine,
        SchedulerCfg {
            interval_secs: settings.sync.interval_secs,
            run_on_start: settings.sync.run_on_start,
        },
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "task-sync listening");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
