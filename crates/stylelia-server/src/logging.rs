use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use stylelia_core::config::LogFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str =
    "stylelia_server=info,stylelia_core=info,stylelia_github=info,tower_http=info";

/// Lines kept for `GET /api/logs`.
const RING_CAPACITY: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LogLine {
    pub ts: DateTime<Utc>,
    pub level: &'static str,
    pub target: String,
    pub message: String,
}

pub(crate) type LogRing = Arc<Mutex<VecDeque<LogLine>>>;

/// Keeps the most recent events in memory so the HTTP API can show what the
/// last cycles did without shell access to the host.
pub(crate) struct RecentLogLayer {
    pub ring: LogRing,
}

struct MessageVisitor<'a> {
    message: &'a mut String,
}

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = format!("{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for RecentLogLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "error",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG => "debug",
            tracing::Level::TRACE => return,
        };

        let mut message = String::new();
        event.record(&mut MessageVisitor {
            message: &mut message,
        });

        let line = LogLine {
            ts: Utc::now(),
            level,
            target: event.metadata().target().to_string(),
            message,
        };
        if let Ok(mut ring) = self.ring.lock() {
            ring.push_back(line);
            if ring.len() > RING_CAPACITY {
                ring.pop_front();
            }
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub(crate) fn init(format: LogFormat) -> LogRing {
    let ring = LogRing::default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(RecentLogLayer { ring: ring.clone() });

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    ring
}

/// Newest last, at most `limit` lines.
pub(crate) fn recent(ring: &LogRing, limit: usize) -> Vec<LogLine> {
    let ring = ring.lock().unwrap_or_else(|e| e.into_inner());
    let skip = ring.len().saturating_sub(limit);
    ring.iter().skip(skip).cloned().collect()
}
