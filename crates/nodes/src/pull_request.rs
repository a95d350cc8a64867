//! Pull request opener and the default pull request text.

use pipeline::{
    BranchName, ContributionError, Credential, FileChange, ForkRef, NewPullRequest, PrDetails,
    PullRequestRef, RepositoryRef, SourceHost,
};
use tracing::info;

/// Title and body the pull request is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestText {
    pub title: String,
    pub body: String,
}

impl PullRequestText {
    /// Fills in whatever the caller left out.
    ///
    /// An explicit body is used verbatim. Otherwise the body lists the changed
    /// files, followed by the caller's description when one was given.
    pub fn resolve(
        details: Option<&PrDetails>,
        upstream: &RepositoryRef,
        changes: &[FileChange],
    ) -> Self {
        let given = |field: Option<&String>| {
            field
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let title = given(details.and_then(|d| d.title.as_ref()))
            .unwrap_or_else(|| format!("Update {upstream}"));

        let body = given(details.and_then(|d| d.body.as_ref())).unwrap_or_else(|| {
            let description = given(details.and_then(|d| d.description.as_ref()));
            default_body(changes, description.as_deref())
        });

        Self { title, body }
    }
}

fn default_body(changes: &[FileChange], description: Option<&str>) -> String {
    let mut body = String::from("This pull request proposes changes to the following files:\n\n");
    for change in changes {
        body.push_str(&format!("- `{}`\n", change.path));
    }
    if let Some(description) = description {
        body.push('\n');
        body.push_str(description);
        body.push('\n');
    }
    body
}

/// Opens the pull request from the fork branch to the upstream default branch.
pub struct PullRequestOpener<'a> {
    host: &'a dyn SourceHost,
}

impl<'a> PullRequestOpener<'a> {
    /// Creates an opener submitting pull requests through `host`.
    pub fn new(host: &'a dyn SourceHost) -> Self {
        Self { host }
    }

    /// Opens `head = <fork owner>:<branch>` against `base` on the upstream.
    ///
    /// # Errors
    ///
    /// [`ContributionError::PullRequestRejected`] for any host failure.
    pub async fn open(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
        fork: &ForkRef,
        branch: &BranchName,
        base: &BranchName,
        text: &PullRequestText,
    ) -> Result<PullRequestRef, ContributionError> {
        let request = NewPullRequest {
            title: text.title.clone(),
            body: text.body.clone(),
            head: format!("{}:{}", fork.owner, branch),
            base: base.clone(),
        };

        let pull_request = self
            .host
            .open_pull_request(credential, upstream, &request)
            .await
            .map_err(|e| ContributionError::PullRequestRejected {
                message: e.to_string(),
            })?;

        info!(url = %pull_request.url, number = %pull_request.number, head = %request.head, "Pull request opened");
        Ok(pull_request)
    }
}
