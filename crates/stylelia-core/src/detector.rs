//! Skip/proceed decision for a reconciliation cycle.

use std::fmt;

use tracing::{info, warn};

use crate::{
    cache::FingerprintCache,
    error::ReconcileError,
    types::{CacheKey, Fingerprint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProceedReason {
    NeverReconciled,
    CacheUnavailable,
    CommitChanged,
    ToolChanged,
    CommitAndToolChanged,
}

impl fmt::Display for ProceedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NeverReconciled => "never reconciled",
            Self::CacheUnavailable => "cache unavailable",
            Self::CommitChanged => "default branch moved",
            Self::ToolChanged => "new tool version",
            Self::CommitAndToolChanged => "default branch moved and new tool version",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Proceed(ProceedReason),
}

impl Decision {
    pub fn should_proceed(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }
}

/// Compare a cache lookup result with the live state.
///
/// Skips only when a fingerprint exists and both fields match. Every other
/// outcome, lookup errors included, proceeds.
pub fn decide(cached: &Result<Fingerprint, ReconcileError>, live: &Fingerprint) -> Decision {
    let cached = match cached {
        Ok(fp) => fp,
        Err(ReconcileError::NotFoundInCache) => {
            return Decision::Proceed(ProceedReason::NeverReconciled)
        }
        Err(_) => return Decision::Proceed(ProceedReason::CacheUnavailable),
    };
    let commit_same = cached.commit_id == live.commit_id;
    let tool_same = cached.tool_version == live.tool_version;
    match (commit_same, tool_same) {
        (true, true) => Decision::Skip,
        (false, true) => Decision::Proceed(ProceedReason::CommitChanged),
        (true, false) => Decision::Proceed(ProceedReason::ToolChanged),
        (false, false) => Decision::Proceed(ProceedReason::CommitAndToolChanged),
    }
}

/// Look up `key` and decide. Never fails: a broken cache means redo the work.
pub async fn detect(cache: &dyn FingerprintCache, key: &CacheKey, live: &Fingerprint) -> Decision {
    let cached = cache.get(key).await;
    if let Err(e) = &cached {
        if !e.is_not_found() {
            warn!("{key}: fingerprint lookup failed, proceeding: {e}");
        }
    }
    let decision = decide(&cached, live);
    match decision {
        Decision::Skip => info!(
            "{key}: unchanged at {} with tool {}, skipping",
            live.commit_id, live.tool_version
        ),
        Decision::Proceed(reason) => info!("{key}: proceeding ({reason})"),
    }
    decision
}
