//! Create-or-update of the single pull request for a reconciliation branch.

use serde::Serialize;
use tracing::info;

use crate::{
    error::{ReconcileError, Result},
    platform::CodeHost,
    types::{NewPullRequest, PullRequest, RepositoryRef},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "pull_request", rename_all = "snake_case")]
pub enum PullRequestAction {
    Created(PullRequest),
    Updated(PullRequest),
}

impl PullRequestAction {
    pub fn pull_request(&self) -> &PullRequest {
        match self {
            Self::Created(pr) | Self::Updated(pr) => pr,
        }
    }
}

/// Make sure exactly one open pull request from `branch` carries `body`.
///
/// An existing PR only gets its body replaced. Two or more open PRs for the
/// branch are reported as [`ReconcileError::AmbiguousOpenPr`] and left alone.
pub async fn upsert_pull_request(
    host: &dyn CodeHost,
    repo: &RepositoryRef,
    branch: &str,
    title: &str,
    body: &str,
) -> Result<PullRequestAction> {
    let open = host
        .list_open_pull_requests(&repo.organization, &repo.name, branch)
        .await?;

    match open.as_slice() {
        [] => {
            let new_pr = NewPullRequest {
                title: title.to_string(),
                head: branch.to_string(),
                base: repo.default_branch.clone(),
                body: body.to_string(),
                maintainer_can_modify: true,
            };
            let pr = host
                .create_pull_request(&repo.organization, &repo.name, &new_pr)
                .await?;
            info!("{}: opened pull request #{} from {branch}", repo.full_name(), pr.number);
            Ok(PullRequestAction::Created(pr))
        }
        [existing] => {
            let pr = host
                .edit_pull_request_body(&repo.organization, &repo.name, existing.number, body)
                .await?;
            info!("{}: refreshed body of pull request #{}", repo.full_name(), pr.number);
            Ok(PullRequestAction::Updated(pr))
        }
        many => Err(ReconcileError::AmbiguousOpenPr {
            branch: branch.to_string(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryHost;

    const BRANCH: &str = "stylelia/cookstyle_1.0";

    fn repo() -> RepositoryRef {
        RepositoryRef {
            organization: "acme".into(),
            name: "widgets".into(),
            default_branch: "main".into(),
            latest_commit_id: "bbb".into(),
        }
    }

    fn open_pr(number: u64, body: &str) -> PullRequest {
        PullRequest {
            number,
            head_branch: BRANCH.into(),
            base_branch: "main".into(),
            title: "cookstyle: 1.0 updates".into(),
            body: body.into(),
            is_open: true,
        }
    }

    #[tokio::test]
    async fn creates_when_none_open() {
        let host = MemoryHost::new();
        let action = upsert_pull_request(&host, &repo(), BRANCH, "cookstyle: 1.0 updates", "fresh")
            .await
            .unwrap();
        let PullRequestAction::Created(pr) = action else { panic!("expected Created") };
        assert_eq!(pr.head_branch, BRANCH);
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.title, "cookstyle: 1.0 updates");
        assert_eq!(pr.body, "fresh");
    }

    #[tokio::test]
    async fn edits_single_open_pr_in_place() {
        let host = MemoryHost::new().with_pull_request(open_pr(7, "stale"));
        let action = upsert_pull_request(&host, &repo(), BRANCH, "ignored title", "fresh")
            .await
            .unwrap();
        assert!(matches!(action, PullRequestAction::Updated(_)));
        assert_eq!(host.create_calls(), 0);
        assert_eq!(host.edit_calls(), 1);
        let pulls = host.pull_requests();
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].number, 7);
        assert_eq!(pulls[0].body, "fresh");
        assert_eq!(pulls[0].title, "cookstyle: 1.0 updates");
    }

    #[tokio::test]
    async fn closed_prs_do_not_count() {
        let mut closed = open_pr(3, "old");
        closed.is_open = false;
        let host = MemoryHost::new().with_pull_request(closed);
        let action = upsert_pull_request(&host, &repo(), BRANCH, "t", "b").await.unwrap();
        assert_eq!(action.pull_request().number, 4);
        assert!(matches!(action, PullRequestAction::Created(_)));
    }

    #[tokio::test]
    async fn two_open_prs_are_ambiguous() {
        let host = MemoryHost::new()
            .with_pull_request(open_pr(1, "a"))
            .with_pull_request(open_pr(2, "b"));
        let err = upsert_pull_request(&host, &repo(), BRANCH, "t", "fresh").await.unwrap_err();
        assert!(matches!(err, ReconcileError::AmbiguousOpenPr { count: 2, .. }));
        assert_eq!(host.create_calls(), 0);
        assert_eq!(host.edit_calls(), 0);
        assert!(host.pull_requests().iter().all(|p| p.body != "fresh"));
    }
}
