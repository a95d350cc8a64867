//! Port traits the pipeline depends on, and the credential passed through them.
//!
//! Infrastructure crates implement these traits: `github` provides the
//! [`SourceHost`], `store` provides the [`ContributionStore`]s. The stage
//! components in `nodes` see nothing but these traits.

use async_trait::async_trait;

use crate::{
    ActorId, BlobSha, BranchName, CommitRef, CommitSha, Contribution, ContributionError,
    ContributionId, ContributionStatus, ForkCreation, HostError, NewContribution, NewPullRequest,
    PullRequestNumber, PullRequestRef, PullRequestState, PutFileRequest, RepositoryInfo,
    RepositoryOwner, RepositoryRef, StoreError,
};

// ---------------------------------------------------------------------------
// Credential context
// ---------------------------------------------------------------------------

/// Bearer credential plus the identity acting with it.
///
/// Owned by the caller and borrowed by every host call of a run; the pipeline
/// never creates or stores one. `Debug` never prints the token.
#[derive(Clone)]
pub struct Credential {
    token: String,
    actor: ActorId,
}

impl Credential {
    /// Builds a credential from an optional token.
    ///
    /// # Errors
    ///
    /// [`ContributionError::AuthenticationMissing`] if the token is absent or blank.
    pub fn from_token(actor: ActorId, token: Option<String>) -> Result<Self, ContributionError> {
        match token.map(|t| t.trim().to_string()) {
            Some(token) if !token.is_empty() => Ok(Self { token, actor }),
            _ => Err(ContributionError::AuthenticationMissing),
        }
    }

    /// The raw bearer token, for building the `Authorization` header.
    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    /// Identity that initiated the run.
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("actor", &self.actor)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Source host
// ---------------------------------------------------------------------------

/// The REST operations the pipeline performs against the source-control host.
///
/// Every method is a single request. Implementations do not retry.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// `POST /repos/{owner}/{repo}/forks`.
    ///
    /// An "already exists" response is [`ForkCreation::AlreadyExists`], not an error.
    async fn create_fork(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
    ) -> Result<ForkCreation, HostError>;

    /// `GET /user`: login of the account the credential belongs to.
    async fn authenticated_login(
        &self,
        credential: &Credential,
    ) -> Result<RepositoryOwner, HostError>;

    /// `GET /repos/{owner}/{repo}`.
    async fn get_repository(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
    ) -> Result<RepositoryInfo, HostError>;

    /// `GET /repos/{owner}/{repo}/git/ref/heads/{branch}`: the commit the branch points at.
    async fn get_branch_head(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        branch: &BranchName,
    ) -> Result<CommitSha, HostError>;

    /// `POST /repos/{owner}/{repo}/git/refs` creating `refs/heads/{branch}` at `sha`.
    async fn create_branch(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        branch: &BranchName,
        sha: &CommitSha,
    ) -> Result<(), HostError>;

    /// `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}`.
    ///
    /// Returns `Ok(None)` when the file does not exist on that branch.
    async fn get_file_sha(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        path: &str,
        branch: &BranchName,
    ) -> Result<Option<BlobSha>, HostError>;

    /// `PUT /repos/{owner}/{repo}/contents/{path}`.
    async fn put_file(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        request: &PutFileRequest,
    ) -> Result<CommitRef, HostError>;

    /// `POST /repos/{owner}/{repo}/pulls`.
    async fn open_pull_request(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<PullRequestRef, HostError>;

    /// `GET /repos/{owner}/{repo}/pulls/{number}`.
    async fn get_pull_request(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        number: PullRequestNumber,
    ) -> Result<PullRequestState, HostError>;
}

// ---------------------------------------------------------------------------
// Contribution store
// ---------------------------------------------------------------------------

/// Durable storage for [`Contribution`] records.
#[async_trait]
pub trait ContributionStore: Send + Sync {
    /// Persists a new record and assigns its identifier.
    async fn insert(&self, contribution: NewContribution) -> Result<Contribution, StoreError>;

    /// Looks a record up by identifier.
    async fn get(&self, id: ContributionId) -> Result<Option<Contribution>, StoreError>;

    /// Lists records, optionally restricted to one actor, oldest first.
    async fn list(&self, actor: Option<&ActorId>) -> Result<Vec<Contribution>, StoreError>;

    /// Replaces the status of a record and returns the updated record.
    async fn update_status(
        &self,
        id: ContributionId,
        status: ContributionStatus,
    ) -> Result<Contribution, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorId {
        ActorId::new("user-1").unwrap()
    }

    #[test]
    fn test_credential_requires_a_token() {
        assert_eq!(
            Credential::from_token(actor(), None).unwrap_err(),
            ContributionError::AuthenticationMissing
        );
        assert_eq!(
            Credential::from_token(actor(), Some("   ".into())).unwrap_err(),
            ContributionError::AuthenticationMissing
        );
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let credential = Credential::from_token(actor(), Some("ghp_secret".into())).unwrap();
        assert_eq!(credential.bearer_token(), "ghp_secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("redacted"));
    }
}
