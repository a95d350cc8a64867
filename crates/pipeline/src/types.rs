//! Shared value types for the contribution pipeline.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. a readiness policy always polls at
//! least once) and flow between the pipeline stages.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    BlobSha, BranchName, ChallengeId, CommitSha, PullRequestNumber, RepositoryName,
    RepositoryOwner, RepositoryRef,
};

// ---------------------------------------------------------------------------
// Caller inputs
// ---------------------------------------------------------------------------

/// One proposed file edit: the full desired content at a repository-relative path.
///
/// Not a diff. Changes are applied in the order the caller supplies them
/// because every commit advances the branch head the next commit builds on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root, using `/` separators.
    pub path: String,
    /// Complete file content after the change.
    pub content: String,
}

impl FileChange {
    /// Creates a file change.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Caller-supplied pull request text. Every field is optional.
///
/// A missing `title` or `body` is filled in by the pull request opener;
/// `description` is appended to the generated body and ignored when an
/// explicit `body` is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDetails {
    /// Pull request title.
    #[serde(default)]
    pub title: Option<String>,
    /// Complete pull request body.
    #[serde(default)]
    pub body: Option<String>,
    /// Free text appended to the default body template.
    #[serde(default)]
    pub description: Option<String>,
}

/// Everything a caller asks the pipeline to do in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRequest {
    /// Upstream repository the pull request targets.
    pub upstream: RepositoryRef,
    /// Ordered file edits.
    pub changes: Vec<FileChange>,
    /// Optional pull request text.
    #[serde(default)]
    pub pr_details: Option<PrDetails>,
    /// Optional foreign reference stored on the contribution record.
    #[serde(default)]
    pub challenge_id: Option<ChallengeId>,
}

/// What a caller receives for a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionReceipt {
    /// Public URL of the opened pull request.
    pub pr_url: String,
    /// Pull request number in the upstream repository.
    pub pr_number: PullRequestNumber,
    /// Branch on the fork carrying the commits.
    pub branch_name: BranchName,
    /// Account owning the fork.
    pub fork_owner: RepositoryOwner,
}

// ---------------------------------------------------------------------------
// Host-side values
// ---------------------------------------------------------------------------

/// The fork a run works against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkRef {
    /// Account owning the fork.
    pub owner: RepositoryOwner,
    /// Fork repository name. Normally equal to the upstream name.
    pub name: RepositoryName,
}

impl ForkRef {
    /// Returns the fork as a plain repository reference.
    pub fn repository(&self) -> RepositoryRef {
        RepositoryRef::new(self.owner.clone(), self.name.clone())
    }

    /// Returns the `owner/name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Result of asking the host to fork a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForkCreation {
    /// The host accepted the request and reported where the fork lives.
    Created(ForkRef),
    /// The caller already has a fork. The host does not say where it is.
    AlreadyExists,
}

/// The subset of repository metadata the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// `owner/name` as reported by the host.
    pub full_name: String,
    /// Default branch. Absent or empty while a new fork is still being built.
    pub default_branch: Option<String>,
}

impl RepositoryInfo {
    /// Returns the default branch when it is present and non-empty.
    pub fn usable_default_branch(&self) -> Option<BranchName> {
        self.default_branch.as_deref().and_then(BranchName::new)
    }
}

/// A single content-replacement write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutFileRequest {
    /// Repository-relative path.
    pub path: String,
    /// Raw file content; the adapter encodes it for transport.
    pub content: String,
    /// Commit message.
    pub message: String,
    /// Branch to commit to.
    pub branch: BranchName,
    /// Current blob SHA when overwriting an existing file.
    pub previous_sha: Option<BlobSha>,
}

/// A pull request to open against an upstream repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Title.
    pub title: String,
    /// Body (Markdown).
    pub body: String,
    /// Head reference in `owner:branch` form.
    pub head: String,
    /// Base branch in the upstream repository.
    pub base: BranchName,
}

/// An opened pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// Public (HTML) URL.
    pub url: String,
    /// Pull request number.
    pub number: PullRequestNumber,
}

/// Lifecycle state of a pull request as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestState {
    /// `true` when the host reports `state == "closed"`.
    pub closed: bool,
    /// `true` when the pull request was merged.
    pub merged: bool,
}

/// The commit produced by a file write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    /// SHA of the new commit.
    pub sha: CommitSha,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Fixed-interval polling budget for the fork readiness stage.
///
/// Only built through [`ForkReadinessPolicy::new`] or `Default`, so
/// `max_attempts` is always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForkReadinessPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl ForkReadinessPolicy {
    /// Default wait between attempts.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Default number of reads before giving up.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

    /// Creates a policy.
    ///
    /// Returns `None` if `max_attempts` is zero.
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Option<Self> {
        if max_attempts == 0 {
            None
        } else {
            Some(Self {
                interval,
                max_attempts,
            })
        }
    }

    /// Wait between two consecutive attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum number of reads.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ForkReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
