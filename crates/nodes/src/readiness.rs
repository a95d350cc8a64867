//! Fork readiness poller.
//!
//! Forks are built asynchronously on the host: right after the fork request a
//! read may 404 or return a repository without a default branch. The poller
//! reads at a fixed interval until both conditions clear or the budget runs out.

use pipeline::{
    BranchName, ContributionError, Credential, ForkReadinessPolicy, ForkRef, SourceHost,
};
use tracing::{debug, info, warn};

/// Waits for a freshly created fork to become usable.
pub struct ForkReadinessPoller<'a> {
    host: &'a dyn SourceHost,
    policy: ForkReadinessPolicy,
}

impl<'a> ForkReadinessPoller<'a> {
    /// Creates a poller reading through `host` on the schedule in `policy`.
    pub fn new(host: &'a dyn SourceHost, policy: ForkReadinessPolicy) -> Self {
        Self { host, policy }
    }

    /// Polls until the fork is readable and reports a non-empty default branch.
    ///
    /// Returns the fork's default branch. The wait between attempts suspends
    /// the task (`tokio::time::sleep`); no sleep follows the final attempt.
    ///
    /// # Errors
    ///
    /// [`ContributionError::ForkTimeout`] once `max_attempts` reads have not
    /// produced a usable fork. [`ContributionError::ForkFailed`] as soon as a
    /// read fails in a way retrying cannot fix (rejected credential, 4xx,
    /// rate limiting).
    pub async fn wait_until_ready(
        &self,
        credential: &Credential,
        fork: &ForkRef,
    ) -> Result<BranchName, ContributionError> {
        let repository = fork.repository();
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            match self.host.get_repository(credential, &repository).await {
                Ok(info) => match info.usable_default_branch() {
                    Some(branch) => {
                        info!(fork = %repository, attempt, default_branch = %branch, "Fork is ready");
                        return Ok(branch);
                    }
                    None => debug!(fork = %repository, attempt, "Fork has no default branch yet"),
                },
                Err(e) if e.is_not_found() => {
                    debug!(fork = %repository, attempt, "Fork not visible yet")
                }
                Err(e) if e.is_transient() => {
                    warn!(fork = %repository, attempt, error = %e, "Fork read failed, retrying")
                }
                Err(e) => {
                    warn!(fork = %repository, attempt, error = %e, "Fork read rejected");
                    return Err(ContributionError::ForkFailed {
                        repository: repository.full_name(),
                        message: e.to_string(),
                    });
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.interval()).await;
            }
        }

        Err(ContributionError::ForkTimeout {
            fork: repository.full_name(),
            attempts: max_attempts,
        })
    }
}
