//! Branch provisioner: create the run's branch on the fork.

use pipeline::{
    BranchName, CommitSha, ContributionError, Credential, ForkRef, HostError, RepositoryRef,
    SourceHost,
};
use tracing::info;

/// The branch a run commits to, and what it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedBranch {
    /// New branch on the fork.
    pub name: BranchName,
    /// Upstream default branch; the pull request targets it.
    pub base: BranchName,
    /// Fork commit the new branch starts at.
    pub base_sha: CommitSha,
}

/// Resolves the base commit and creates the run's branch on the fork.
pub struct BranchProvisioner<'a> {
    host: &'a dyn SourceHost,
}

impl<'a> BranchProvisioner<'a> {
    /// Creates a provisioner writing refs through `host`.
    pub fn new(host: &'a dyn SourceHost) -> Self {
        Self { host }
    }

    /// Reads the upstream default branch, reads that branch's head on the
    /// fork, then creates `branch` on the fork at that commit.
    ///
    /// # Errors
    ///
    /// - [`ContributionError::BranchResolutionFailed`] if either read fails.
    /// - [`ContributionError::BranchCreateConflict`] if `branch` already exists.
    /// - [`ContributionError::BranchCreateFailed`] for other write rejections.
    pub async fn provision(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
        fork: &ForkRef,
        branch: &BranchName,
    ) -> Result<ProvisionedBranch, ContributionError> {
        let resolution_failed = |message: String| ContributionError::BranchResolutionFailed {
            message,
        };

        let upstream_info = self
            .host
            .get_repository(credential, upstream)
            .await
            .map_err(|e| resolution_failed(format!("reading {upstream}: {e}")))?;
        let base = upstream_info.usable_default_branch().ok_or_else(|| {
            resolution_failed(format!("{upstream} does not report a default branch"))
        })?;

        let fork_repo = fork.repository();
        let base_sha = self
            .host
            .get_branch_head(credential, &fork_repo, &base)
            .await
            .map_err(|e| resolution_failed(format!("reading {fork_repo}@{base}: {e}")))?;

        self.host
            .create_branch(credential, &fork_repo, branch, &base_sha)
            .await
            .map_err(|e| match e {
                HostError::Conflict { message } => ContributionError::BranchCreateConflict {
                    branch: branch.clone(),
                    message,
                },
                other => ContributionError::BranchCreateFailed {
                    branch: branch.clone(),
                    message: other.to_string(),
                },
            })?;

        info!(fork = %fork_repo, branch = %branch, base = %base, sha = %base_sha, "Branch created");
        Ok(ProvisionedBranch {
            name: branch.clone(),
            base,
            base_sha,
        })
    }
}
