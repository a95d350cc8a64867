//! Core domain for Upstreamer, the fork-and-pull-request contribution pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, error type and port trait used throughout the pipeline. Infrastructure
//! crates implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`BranchName`, `RepositoryRef`, `ContributionId`, etc.) |
//! | [`types`] | Shared value types (`FileChange`, `PrDetails`, `ForkRef`, `ForkReadinessPolicy`, etc.) |
//! | [`contribution`] | The persisted `Contribution` record and `ContributionStatus` |
//! | [`run`] | The explicit run state machine (`PipelineStage`, `RunState`, `PipelineRun`) |
//! | [`branch_names`] | Process-unique, time-seeded branch names |
//! | [`ports`] | `SourceHost` and `ContributionStore` traits, `Credential` |
//! | [`errors`] | `ContributionError`, `PipelineFailure`, port error types |

pub mod branch_names;
pub mod contribution;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod run;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use branch_names::{BranchNameGenerator, BRANCH_PREFIX};
pub use contribution::{Contribution, ContributionStatus, NewContribution, PullRequestLocator};
pub use errors::{
    ContributionError, HostError, Leftovers, PipelineFailure, StatusCheckError, StoreError,
};
pub use identifiers::{
    ActorId, BlobSha, BranchName, ChallengeId, CommitSha, ContributionId, PipelineRunId,
    PullRequestNumber, RepositoryName, RepositoryOwner, RepositoryRef,
};
pub use ports::{ContributionStore, Credential, SourceHost};
pub use run::{PipelineRun, PipelineStage, RunState, StageTransition};
pub use types::{
    CommitRef, ContributionReceipt, ContributionRequest, FileChange, ForkCreation,
    ForkReadinessPolicy, ForkRef, NewPullRequest, PrDetails, PullRequestRef, PullRequestState,
    PutFileRequest, RepositoryInfo, Timestamp,
};
