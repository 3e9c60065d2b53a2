use async_trait::async_trait;
use serde::Deserialize;
use stylelia_core::{lint::ToolRegistry, ReconcileError, Result};
use tracing::debug;

use crate::{http_client, read_json};

/// Looks up the newest published gem version, e.g. for `cookstyle`.
pub struct RubyGemsClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Deserialize)]
struct LatestVersion {
    version: String,
}

impl RubyGemsClient {
    pub fn new(base: &str) -> Self {
        Self {
            http: http_client(),
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ToolRegistry for RubyGemsClient {
    async fn latest_version(&self, tool: &str) -> Result<String> {
        let url = format!(
            "{}/api/v1/versions/{}/latest.json",
            self.base,
            urlencoding::encode(tool)
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ReconcileError::transport)?;
        let latest: LatestVersion = read_json(resp, "gem version").await?;
        // Unknown gems come back as 200 {"version":"unknown"}.
        if latest.version.is_empty() || latest.version == "unknown" {
            return Err(ReconcileError::decode(
                "gem version",
                format!("no published version for {tool}"),
            ));
        }
        debug!("{tool}: latest published version {}", latest.version);
        Ok(latest.version)
    }
}
