mod logging;
mod routes;

use std::{sync::Arc, time::Instant};

use anyhow::Context;

use stylelia_core::{
    cache::{FingerprintCache, MemoryCache, PgCache},
    config::Config,
    git::ProcessRunner,
    pipeline::Pipeline,
};
use stylelia_github::{GitHubClient, RubyGemsClient};
use tracing::{info, warn};

use crate::logging::LogRing;

pub(crate) struct AppState {
    pub pipeline: Pipeline,
    /// Held for the duration of a cycle; at most one runs at a time.
    pub running: tokio::sync::Mutex<()>,
    pub last: std::sync::Mutex<Option<routes::LastCycle>>,
    pub logs: LogRing,
    pub start_time: Instant,
}

impl AppState {
    pub(crate) fn new(pipeline: Pipeline, logs: LogRing, start_time: Instant) -> Self {
        Self {
            pipeline,
            running: tokio::sync::Mutex::new(()),
            last: std::sync::Mutex::new(None),
            logs,
            start_time,
        }
    }
}

// ── main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env().context("loading configuration")?);
    let logs = logging::init(config.log_format);
    info!("stylelia: {config:?}");

    let cache: Arc<dyn FingerprintCache> = if config.cache_endpoint.is_empty() {
        warn!("CACHE_URL not set; fingerprints are kept in memory and lost on exit");
        Arc::new(MemoryCache::new())
    } else {
        let pg = PgCache::connect(&config.cache_endpoint).context("connecting fingerprint cache")?;
        pg.migrate().await.context("migrating fingerprint cache")?;
        Arc::new(pg)
    };

    let pipeline = Pipeline::new(
        Arc::clone(&config),
        Arc::new(GitHubClient::new(&config.github_api_url, &config.platform_token)),
        Arc::new(RubyGemsClient::new(&config.rubygems_url)),
        cache,
        Arc::new(ProcessRunner),
    );

    if !config.serve {
        let report = pipeline.run_cycle().await?;
        info!(
            "{}: cycle ended in {} after {}ms",
            report.repository,
            report.outcome,
            (report.finished_at - report.started_at).num_milliseconds()
        );
        return Ok(());
    }

    let state = Arc::new(AppState::new(pipeline, logs, Instant::now()));
    let app = routes::router(state);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
