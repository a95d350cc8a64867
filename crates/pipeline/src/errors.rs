//! Error types for the contribution pipeline domain.
//!
//! [`ContributionError`] is the stage-level taxonomy a caller reacts to.
//! [`HostError`] and [`StoreError`] are what the port implementations return;
//! the stage components translate them into [`ContributionError`] variants.
//! [`PipelineFailure`] is the terminal result of a failed run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BranchName, ContributionId, ForkRef, PipelineRunId, PipelineStage};

// ---------------------------------------------------------------------------
// Host (port) errors
// ---------------------------------------------------------------------------

/// Errors returned by a [`crate::SourceHost`] implementation.
///
/// Variants classify the host response; they carry the host's own message so
/// it can be surfaced unchanged to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The requested object does not exist (HTTP 404).
    #[error("not found: {message}")]
    NotFound {
        /// Message reported by the host.
        message: String,
    },

    /// The write collides with existing state: already forked, branch
    /// already exists, or a stale/missing blob SHA.
    #[error("conflict: {message}")]
    Conflict {
        /// Message reported by the host.
        message: String,
    },

    /// The host rejected the request as invalid (HTTP 422).
    #[error("validation failed: {message}")]
    Unprocessable {
        /// Message reported by the host.
        message: String,
    },

    /// The credential was rejected (HTTP 401).
    #[error("authentication rejected: {message}")]
    Unauthorized {
        /// Message reported by the host.
        message: String,
    },

    /// The host is throttling this credential (HTTP 429, or 403 with an
    /// exhausted rate-limit budget).
    #[error("rate limited")]
    RateLimited {
        /// How long the host asked the caller to wait, when it said.
        retry_after: Option<Duration>,
    },

    /// Any other non-success response.
    #[error("host returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by the host.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl HostError {
    /// Returns `true` for [`HostError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`HostError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` when repeating the same request may succeed without the
    /// caller changing anything: missing objects, transport failures and
    /// server-side (5xx) errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Store (port) errors
// ---------------------------------------------------------------------------

/// Errors returned by a [`crate::ContributionStore`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No record has the given identifier.
    #[error("contribution {0} not found")]
    NotFound(ContributionId),

    /// The backing storage could not be read or written.
    #[error("storage I/O failed: {0}")]
    Io(String),

    /// The backing storage holds data that cannot be decoded.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Why a contribution run stopped.
///
/// Each variant belongs to exactly one stage; see [`ContributionError::stage`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContributionError {
    /// No bearer credential was supplied.
    #[error("no credential was supplied")]
    AuthenticationMissing,

    /// The host rejected fork creation for a reason other than "already exists".
    #[error("fork of {repository} failed: {message}")]
    ForkFailed {
        /// Upstream repository (`owner/name`).
        repository: String,
        /// Underlying host message.
        message: String,
    },

    /// The fork never became readable with a default branch.
    #[error("fork {fork} was not ready after {attempts} attempts")]
    ForkTimeout {
        /// Fork repository (`owner/name`).
        fork: String,
        /// Number of reads performed.
        attempts: u32,
    },

    /// The upstream default branch or the fork's head commit could not be read.
    #[error("could not resolve the base branch: {message}")]
    BranchResolutionFailed {
        /// Underlying host message.
        message: String,
    },

    /// The branch already exists on the fork.
    #[error("branch {branch} already exists: {message}")]
    BranchCreateConflict {
        /// Branch that collided.
        branch: BranchName,
        /// Underlying host message.
        message: String,
    },

    /// The host rejected the branch reference write for another reason.
    #[error("creating branch {branch} failed: {message}")]
    BranchCreateFailed {
        /// Branch that could not be created.
        branch: BranchName,
        /// Underlying host message.
        message: String,
    },

    /// The file write was rejected because the blob SHA was stale or missing.
    #[error("commit of {path} conflicts with the current branch content: {message}")]
    FileCommitConflict {
        /// Path that was being written.
        path: String,
        /// Underlying host message.
        message: String,
    },

    /// The file write was rejected for any other reason.
    #[error("commit of {path:?} failed: {message}")]
    FileCommitFailed {
        /// Path that was being written.
        path: String,
        /// Underlying host (or local validation) message.
        message: String,
    },

    /// The host refused to open the pull request (no diff, permissions, validation).
    #[error("pull request was rejected: {message}")]
    PullRequestRejected {
        /// Underlying host message.
        message: String,
    },

    /// The pull request is open but the contribution record could not be written.
    #[error("pull request {pr_url} is open but recording it failed: {message}")]
    PersistenceFailed {
        /// URL of the pull request that was opened.
        pr_url: String,
        /// Underlying store message.
        message: String,
    },
}

impl ContributionError {
    /// The stage that produces this error.
    ///
    /// Commit errors report the first commit stage; the executor records the
    /// exact commit index on the [`PipelineFailure`].
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::AuthenticationMissing => PipelineStage::Init,
            Self::ForkFailed { .. } => PipelineStage::Forking,
            Self::ForkTimeout { .. } => PipelineStage::AwaitingFork,
            Self::BranchResolutionFailed { .. }
            | Self::BranchCreateConflict { .. }
            | Self::BranchCreateFailed { .. } => PipelineStage::Branching,
            Self::FileCommitConflict { .. } | Self::FileCommitFailed { .. } => {
                PipelineStage::Committing { index: 1, total: 1 }
            }
            Self::PullRequestRejected { .. } => PipelineStage::OpeningPr,
            Self::PersistenceFailed { .. } => PipelineStage::Persisting,
        }
    }
}

// ---------------------------------------------------------------------------
// Status refresh errors
// ---------------------------------------------------------------------------

/// Errors raised while re-reading a contribution's pull request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusCheckError {
    /// The stored URL does not look like a pull request URL.
    #[error("'{url}' is not a pull request URL")]
    InvalidPullRequestUrl {
        /// The offending URL.
        url: String,
    },

    /// Reading the pull request failed.
    #[error("reading pull request failed: {0}")]
    Host(#[from] HostError),

    /// Updating the stored record failed.
    #[error("updating contribution failed: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Terminal run failure
// ---------------------------------------------------------------------------

/// Host objects a failed run created and left behind.
///
/// Nothing is rolled back; these are reported so a caller can mention them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leftovers {
    /// Fork the run created or reused.
    pub fork: Option<ForkRef>,
    /// Branch the run created on the fork.
    pub branch: Option<BranchName>,
    /// Number of file commits that landed before the failure.
    pub commits_applied: usize,
}

/// Terminal `FAILED(stage, cause)` state of a run.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("contribution run {run_id} failed while {stage}: {cause}")]
pub struct PipelineFailure {
    /// Run that failed.
    pub run_id: PipelineRunId,
    /// Stage that was active when the failure happened.
    pub stage: PipelineStage,
    /// What went wrong.
    pub cause: ContributionError,
    /// Host artefacts left in place.
    pub leftovers: Leftovers,
}
