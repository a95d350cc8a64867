//! Status refresher: re-reads persisted pull requests and records merges and closes.
//!
//! This is the only component that mutates a [`Contribution`] after creation,
//! and it only ever touches `status`.

use std::sync::Arc;

use pipeline::{
    ActorId, Contribution, ContributionId, ContributionStatus, ContributionStore, Credential,
    PullRequestLocator, PullRequestState, SourceHost, StatusCheckError,
};
use tracing::{debug, info, warn};

/// Outcome of refreshing one contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRefresh {
    pub id: ContributionId,
    pub previous: ContributionStatus,
    pub current: ContributionStatus,
}

impl StatusRefresh {
    /// Returns `true` when the stored status was updated.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Maps host pull request state onto a contribution status.
pub fn status_from_pull_request(state: PullRequestState) -> ContributionStatus {
    if state.merged {
        ContributionStatus::Merged
    } else if state.closed {
        ContributionStatus::Closed
    } else {
        ContributionStatus::Open
    }
}

/// Re-reads pull requests and updates stored statuses.
pub struct StatusRefresher {
    host: Arc<dyn SourceHost>,
    store: Arc<dyn ContributionStore>,
}

impl StatusRefresher {
    /// Creates a refresher reading pull requests from `host` and updating `store`.
    pub fn new(host: Arc<dyn SourceHost>, store: Arc<dyn ContributionStore>) -> Self {
        Self { host, store }
    }

    /// Refreshes a single contribution.
    ///
    /// The store is written only when the status actually changed.
    ///
    /// # Errors
    ///
    /// [`StatusCheckError`] if the stored URL cannot be parsed, the host read
    /// fails, or the store update fails.
    pub async fn refresh(
        &self,
        credential: &Credential,
        contribution: &Contribution,
    ) -> Result<StatusRefresh, StatusCheckError> {
        let locator = PullRequestLocator::parse(&contribution.pr_url).ok_or_else(|| {
            StatusCheckError::InvalidPullRequestUrl {
                url: contribution.pr_url.clone(),
            }
        })?;

        let state = self
            .host
            .get_pull_request(credential, &locator.repository, locator.number)
            .await?;
        let current = status_from_pull_request(state);

        let refresh = StatusRefresh {
            id: contribution.id,
            previous: contribution.status,
            current,
        };

        if refresh.changed() {
            self.store.update_status(contribution.id, current).await?;
            info!(contribution_id = %contribution.id, from = %refresh.previous, to = %current, "Contribution status updated");
        } else {
            debug!(contribution_id = %contribution.id, status = %current, "Contribution status unchanged");
        }
        Ok(refresh)
    }

    /// Refreshes every open contribution, optionally only those of `actor`.
    ///
    /// A failure on one record is logged and reported in the result; the
    /// remaining records are still processed.
    ///
    /// # Errors
    ///
    /// [`StatusCheckError::Store`] if the contributions cannot be listed.
    pub async fn refresh_open(
        &self,
        credential: &Credential,
        actor: Option<&ActorId>,
    ) -> Result<Vec<(ContributionId, Result<StatusRefresh, StatusCheckError>)>, StatusCheckError>
    {
        let open: Vec<Contribution> = self
            .store
            .list(actor)
            .await?
            .into_iter()
            .filter(|c| !c.status.is_final())
            .collect();

        let mut results = Vec::with_capacity(open.len());
        for contribution in &open {
            let result = self.refresh(credential, contribution).await;
            if let Err(e) = &result {
                warn!(contribution_id = %contribution.id, error = %e, "Status refresh failed");
            }
            results.push((contribution.id, result));
        }
        Ok(results)
    }
}
