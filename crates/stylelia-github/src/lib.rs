//! HTTP clients for the hosted services a reconciliation cycle talks to.

pub mod github;
pub mod rubygems;

pub use github::GitHubClient;
pub use rubygems::RubyGemsClient;

use serde::de::DeserializeOwned;
use stylelia_core::{ReconcileError, Result};

const USER_AGENT: &str = concat!("stylelia/", env!("CARGO_PKG_VERSION"));

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Non-2xx and I/O failures are transport errors; a 2xx body that does not
/// decode as `T` is a decode error.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, what: &'static str) -> Result<T> {
    let status = resp.status();
    let url = resp.url().path().to_string();
    let body = resp.text().await.map_err(ReconcileError::transport)?;
    if !status.is_success() {
        let snippet: String = body.chars().take(200).collect();
        return Err(ReconcileError::Transport(format!("{status} from {url}: {snippet}")));
    }
    serde_json::from_str(&body).map_err(|e| ReconcileError::decode(what, e))
}
