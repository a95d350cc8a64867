//! Upstreamer pipeline stages and executor.
//!
//! This crate provides one component per pipeline stage (fork, fork readiness,
//! branch, file commit, pull request), the [`PipelineExecutor`] that drives a
//! run through them, and the [`StatusRefresher`] that later records whether a
//! pull request merged.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls on the [`pipeline::SourceHost`]
//! and [`pipeline::ContributionStore`] ports and translate port errors into
//! [`pipeline::ContributionError`]s. They contain no transport details.

pub mod branch;
pub mod commit;
pub mod executor;
pub mod fork;
pub mod pull_request;
pub mod readiness;
pub mod status;

pub use branch::{BranchProvisioner, ProvisionedBranch};
pub use commit::FileCommitter;
pub use executor::{ContributionOutcome, PipelineExecutor};
pub use fork::ForkCoordinator;
pub use pull_request::{PullRequestOpener, PullRequestText};
pub use readiness::ForkReadinessPoller;
pub use status::{status_from_pull_request, StatusRefresh, StatusRefresher};
