//! The durable contribution record and its status lifecycle.
//!
//! A [`Contribution`] exists only for runs that reached an opened pull request.
//! Its fields are fixed at creation except `status` (and `updated_at`), which
//! only the status refresher changes.

use serde::{Deserialize, Serialize};

use crate::{
    ActorId, BranchName, ChallengeId, ContributionId, PullRequestNumber, RepositoryName,
    RepositoryOwner, RepositoryRef, Timestamp,
};

/// Where a contribution's pull request stands on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    /// Pull request is open. Every record starts here.
    Open,
    /// Pull request was merged upstream.
    Merged,
    /// Pull request was closed without merging.
    Closed,
}

impl ContributionStatus {
    /// Returns `true` once the pull request can no longer change state.
    pub fn is_final(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A contribution as handed to the store, before it has an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContribution {
    /// Identity that initiated the run.
    pub actor: ActorId,
    /// Upstream owner.
    pub owner: RepositoryOwner,
    /// Upstream repository name.
    pub repo: RepositoryName,
    /// Account owning the fork.
    pub fork_owner: RepositoryOwner,
    /// Branch on the fork carrying the commits.
    pub branch_name: BranchName,
    /// Public pull request URL.
    pub pr_url: String,
    /// Pull request number.
    pub pr_number: PullRequestNumber,
    /// Title the pull request was opened with.
    pub pr_title: String,
    /// Body the pull request was opened with.
    pub pr_body: String,
    /// Optional challenge/task reference.
    pub challenge_id: Option<ChallengeId>,
}

/// The persisted record of one completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Identifier assigned by the store.
    pub id: ContributionId,
    /// Identity that initiated the run.
    pub actor: ActorId,
    /// Upstream owner.
    pub owner: RepositoryOwner,
    /// Upstream repository name.
    pub repo: RepositoryName,
    /// Account owning the fork the pull request comes from.
    pub fork_owner: RepositoryOwner,
    /// Branch on the fork.
    pub branch_name: BranchName,
    /// Public pull request URL.
    pub pr_url: String,
    /// Pull request number.
    pub pr_number: PullRequestNumber,
    /// Title the pull request was opened with.
    pub pr_title: String,
    /// Body the pull request was opened with.
    pub pr_body: String,
    /// Current pull request state.
    pub status: ContributionStatus,
    /// Optional challenge/task reference.
    #[serde(default)]
    pub challenge_id: Option<ChallengeId>,
    /// When the record was written.
    pub created_at: Timestamp,
    /// When the status last changed (equal to `created_at` until then).
    pub updated_at: Timestamp,
}

impl Contribution {
    /// Materialises a record from a draft, as a store does on insert.
    ///
    /// The status always starts at [`ContributionStatus::Open`].
    pub fn from_new(id: ContributionId, new: NewContribution, now: Timestamp) -> Self {
        Self {
            id,
            actor: new.actor,
            owner: new.owner,
            repo: new.repo,
            fork_owner: new.fork_owner,
            branch_name: new.branch_name,
            pr_url: new.pr_url,
            pr_number: new.pr_number,
            pr_title: new.pr_title,
            pr_body: new.pr_body,
            status: ContributionStatus::Open,
            challenge_id: new.challenge_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// The upstream repository this contribution targets.
    pub fn upstream(&self) -> RepositoryRef {
        RepositoryRef::new(self.owner.clone(), self.repo.clone())
    }
}

// ---------------------------------------------------------------------------
// Pull request locator
// ---------------------------------------------------------------------------

/// A pull request addressed by repository and number, parsed from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestLocator {
    /// Repository the pull request belongs to.
    pub repository: RepositoryRef,
    /// Pull request number.
    pub number: PullRequestNumber,
}

impl PullRequestLocator {
    /// Parses `https://<host>/<owner>/<repo>/pull/<number>`.
    ///
    /// Trailing slashes, query strings and fragments are ignored. Returns
    /// `None` for anything else.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let rest = rest.split(['?', '#']).next()?;

        let mut segments = rest.trim_end_matches('/').split('/');
        let _host = segments.next().filter(|h| !h.is_empty())?;
        let owner = RepositoryOwner::new(segments.next()?)?;
        let name = RepositoryName::new(segments.next()?)?;
        if segments.next()? != "pull" {
            return None;
        }
        let number = segments.next()?.parse::<u64>().ok()?;
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            repository: RepositoryRef::new(owner, name),
            number: PullRequestNumber::new(number),
        })
    }
}
