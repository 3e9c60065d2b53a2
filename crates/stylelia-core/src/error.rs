use thiserror::Error;

/// Failure kinds surfaced by every reconciliation component.
///
/// Components classify, they do not decorate: the message carries what the
/// collaborator said and nothing more.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Network, platform API or cache store failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A JSON payload or lint report could not be decoded into the expected shape.
    #[error("malformed {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// An external process could not be spawned or exited unsuccessfully.
    #[error("`{command}` failed with exit code {exit_code}: {output}")]
    Execution {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// No fingerprint stored for the key. Expected on a first run.
    #[error("cache: key not found")]
    NotFoundInCache,

    /// More than one open pull request shares the reconciliation branch.
    #[error("{count} open pull requests found for head branch {branch}")]
    AmbiguousOpenPr { branch: String, count: usize },
}

impl ReconcileError {
    pub fn transport(e: impl std::fmt::Display) -> Self {
        Self::Transport(e.to_string())
    }

    pub fn decode(what: &'static str, e: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: e.to_string(),
        }
    }

    /// The lint tool's stdout did not match the report shape.
    pub fn malformed_report(e: impl std::fmt::Display) -> Self {
        Self::decode("lint report", e)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFoundInCache)
    }
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
