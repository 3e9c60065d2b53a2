//! GitHub REST v3 client covering the repository, commit and pull request
//! calls a cycle needs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stylelia_core::{
    platform::CodeHost, NewPullRequest, PullRequest, ReconcileError, Result,
};
use tracing::debug;

use crate::{http_client, read_json};

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize)]
struct Repo {
    default_branch: String,
}

#[derive(Deserialize)]
struct Commit {
    sha: String,
}

#[derive(Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct Pull {
    number: u64,
    state: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    head: BranchRef,
    base: BranchRef,
}

impl From<Pull> for PullRequest {
    fn from(p: Pull) -> Self {
        PullRequest {
            number: p.number,
            is_open: p.state == "open",
            head_branch: p.head.name,
            base_branch: p.base.name,
            title: p.title,
            body: p.body.unwrap_or_default(),
        }
    }
}

impl GitHubClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: http_client(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn repo_url(&self, org: &str, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(org),
            urlencoding::encode(repo)
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        req.send().await.map_err(ReconcileError::transport)
    }
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn default_branch(&self, org: &str, repo: &str) -> Result<String> {
        let url = self.repo_url(org, repo);
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        let repo: Repo = read_json(resp, "repository").await?;
        Ok(repo.default_branch)
    }

    async fn latest_commit(&self, org: &str, repo: &str, branch: &str) -> Result<String> {
        let url = format!(
            "{}/commits/{}",
            self.repo_url(org, repo),
            urlencoding::encode(branch)
        );
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        let commit: Commit = read_json(resp, "commit").await?;
        debug!("{org}/{repo}@{branch} is {}", commit.sha);
        Ok(commit.sha)
    }

    async fn list_open_pull_requests(
        &self,
        org: &str,
        repo: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>> {
        let url = format!(
            "{}/pulls?state=open&per_page=100&head={}",
            self.repo_url(org, repo),
            urlencoding::encode(&format!("{org}:{head}"))
        );
        let resp = self.send(self.request(reqwest::Method::GET, &url)).await?;
        let pulls: Vec<Pull> = read_json(resp, "pull request list").await?;
        Ok(pulls
            .into_iter()
            .map(PullRequest::from)
            .filter(|pr| pr.is_open && pr.head_branch == head)
            .collect())
    }

    async fn create_pull_request(
        &self,
        org: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest> {
        let url = format!("{}/pulls", self.repo_url(org, repo));
        let resp = self
            .send(self.request(reqwest::Method::POST, &url).json(pr))
            .await?;
        let created: Pull = read_json(resp, "pull request").await?;
        Ok(created.into())
    }

    async fn edit_pull_request_body(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<PullRequest> {
        let url = format!("{}/pulls/{number}", self.repo_url(org, repo));
        let resp = self
            .send(self.request(reqwest::Method::PATCH, &url).json(&json!({ "body": body })))
            .await?;
        let edited: Pull = read_json(resp, "pull request").await?;
        Ok(edited.into())
    }
}
