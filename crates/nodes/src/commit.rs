//! File committer: one content-replacement commit per file change.
//!
//! The contents API needs the current blob SHA to overwrite a file. The
//! committer reads it first; a missing file is a create, not an error. A stale
//! or missing SHA on the write comes back as a conflict and is reported as
//! [`ContributionError::FileCommitConflict`]. It is never retried, because a
//! blind retry could overwrite a change made in between.

use pipeline::{
    BranchName, CommitRef, ContributionError, Credential, FileChange, ForkRef, HostError,
    PutFileRequest, SourceHost,
};
use tracing::{debug, info};

/// Applies file changes to a branch on the fork.
pub struct FileCommitter<'a> {
    host: &'a dyn SourceHost,
}

impl<'a> FileCommitter<'a> {
    /// Creates a committer writing files through `host`.
    pub fn new(host: &'a dyn SourceHost) -> Self {
        Self { host }
    }

    /// Commits a single change to `branch`.
    ///
    /// # Errors
    ///
    /// - [`ContributionError::FileCommitFailed`] for an invalid path, a failed
    ///   read probe, or a non-conflict write rejection.
    /// - [`ContributionError::FileCommitConflict`] when the host reports the
    ///   blob SHA as stale or missing.
    pub async fn commit(
        &self,
        credential: &Credential,
        fork: &ForkRef,
        branch: &BranchName,
        change: &FileChange,
    ) -> Result<CommitRef, ContributionError> {
        let failed = |message: String| ContributionError::FileCommitFailed {
            path: change.path.clone(),
            message,
        };

        validate_path(&change.path).map_err(|reason| failed(reason.to_string()))?;

        let repository = fork.repository();
        let previous_sha = self
            .host
            .get_file_sha(credential, &repository, &change.path, branch)
            .await
            .map_err(|e| failed(format!("reading current content: {e}")))?;

        let verb = if previous_sha.is_some() { "Update" } else { "Create" };
        debug!(path = %change.path, existing = previous_sha.is_some(), "Writing file");

        let request = PutFileRequest {
            path: change.path.clone(),
            content: change.content.clone(),
            message: format!("{verb} {}", change.path),
            branch: branch.clone(),
            previous_sha,
        };

        let commit = self
            .host
            .put_file(credential, &repository, &request)
            .await
            .map_err(|e| match e {
                HostError::Conflict { message } => ContributionError::FileCommitConflict {
                    path: change.path.clone(),
                    message,
                },
                other => failed(other.to_string()),
            })?;

        info!(path = %change.path, branch = %branch, commit = %commit.sha, "File committed");
        Ok(commit)
    }
}

/// Rejects paths that are empty or could resolve outside the repository root.
fn validate_path(path: &str) -> Result<(), &'static str> {
    if path.trim().is_empty() {
        return Err("path must not be empty");
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err("path must be relative to the repository root");
    }
    if path.contains('\\') {
        return Err("path must use '/' separators");
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err("path must not contain empty, '.' or '..' segments");
    }
    Ok(())
}
