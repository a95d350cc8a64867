//! Fork coordinator: make sure the caller has a fork of the upstream repository.

use pipeline::{
    ContributionError, Credential, ForkCreation, ForkRef, RepositoryRef, SourceHost,
};
use tracing::{debug, info};

/// Ensures a fork of the upstream repository exists under the caller's account.
pub struct ForkCoordinator<'a> {
    host: &'a dyn SourceHost,
}

impl<'a> ForkCoordinator<'a> {
    /// Creates a coordinator forking through `host`.
    pub fn new(host: &'a dyn SourceHost) -> Self {
        Self { host }
    }

    /// Requests a fork and returns where it lives.
    ///
    /// When the host answers "already exists" the fork is assumed to be
    /// `<authenticated login>/<upstream name>`, since the host does not return
    /// the existing fork's details. Nothing is retried.
    ///
    /// # Errors
    ///
    /// [`ContributionError::ForkFailed`] for any rejection other than
    /// "already exists", and when the login lookup on that path fails.
    pub async fn ensure_fork(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
    ) -> Result<ForkRef, ContributionError> {
        let fork_failed = |message: String| ContributionError::ForkFailed {
            repository: upstream.full_name(),
            message,
        };

        let creation = self
            .host
            .create_fork(credential, upstream)
            .await
            .map_err(|e| fork_failed(e.to_string()))?;

        let fork = match creation {
            ForkCreation::Created(fork) => {
                info!(fork = %fork.full_name(), "Fork requested");
                fork
            }
            ForkCreation::AlreadyExists => {
                debug!(upstream = %upstream, "Fork already exists; resolving caller login");
                let login = self
                    .host
                    .authenticated_login(credential)
                    .await
                    .map_err(|e| fork_failed(format!("fork exists but login lookup failed: {e}")))?;
                let fork = ForkRef {
                    owner: login,
                    name: upstream.name.clone(),
                };
                info!(fork = %fork.full_name(), "Reusing existing fork");
                fork
            }
        };

        Ok(fork)
    }
}
