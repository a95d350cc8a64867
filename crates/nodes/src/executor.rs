//! The contribution pipeline executor.
//!
//! Drives one run through every stage in order, tracking it with a
//! [`PipelineRun`]. The first failing stage ends the run; nothing created on
//! the host before that point is rolled back. A [`Contribution`] is written
//! only after the pull request has been opened.

use std::sync::Arc;

use pipeline::{
    BranchNameGenerator, Contribution, ContributionError, ContributionReceipt,
    ContributionRequest, ContributionStore, Credential, ForkReadinessPolicy, NewContribution,
    PipelineFailure, PipelineRun, PipelineRunId, PipelineStage, SourceHost,
};
use tracing::{error, info, Instrument};

use crate::branch::BranchProvisioner;
use crate::commit::FileCommitter;
use crate::fork::ForkCoordinator;
use crate::pull_request::{PullRequestOpener, PullRequestText};
use crate::readiness::ForkReadinessPoller;

/// Result of a run that reached `Persisted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionOutcome {
    /// Run that produced the record.
    pub run_id: PipelineRunId,
    /// The persisted record.
    pub contribution: Contribution,
    /// Every stage the run entered, in order.
    pub stages: Vec<PipelineStage>,
}

impl ContributionOutcome {
    /// The caller-facing summary: pull request, branch and fork owner.
    pub fn receipt(&self) -> ContributionReceipt {
        ContributionReceipt {
            pr_url: self.contribution.pr_url.clone(),
            pr_number: self.contribution.pr_number,
            branch_name: self.contribution.branch_name.clone(),
            fork_owner: self.contribution.fork_owner.clone(),
        }
    }
}

/// Sequences fork → wait → branch → commits → pull request → record.
///
/// Holds no per-run state, so one executor can serve concurrent runs.
pub struct PipelineExecutor {
    host: Arc<dyn SourceHost>,
    store: Arc<dyn ContributionStore>,
    readiness: ForkReadinessPolicy,
    branch_names: &'static BranchNameGenerator,
}

impl PipelineExecutor {
    /// Creates an executor that names branches with the process-wide generator.
    pub fn new(
        host: Arc<dyn SourceHost>,
        store: Arc<dyn ContributionStore>,
        readiness: ForkReadinessPolicy,
    ) -> Self {
        Self {
            host,
            store,
            readiness,
            branch_names: BranchNameGenerator::process(),
        }
    }

    /// Executes one contribution run.
    ///
    /// # Errors
    ///
    /// A [`PipelineFailure`] naming the stage that failed, its cause, and any
    /// fork/branch/commits left on the host.
    pub async fn run(
        &self,
        credential: &Credential,
        request: &ContributionRequest,
    ) -> Result<ContributionOutcome, PipelineFailure> {
        let mut run = PipelineRun::start();
        let span = tracing::info_span!(
            "contribution_run",
            run_id = %run.id(),
            upstream = %request.upstream,
            actor = %credential.actor(),
        );

        async {
            match self.execute(&mut run, credential, request).await {
                Ok(contribution) => {
                    run.complete(contribution.id);
                    info!(contribution_id = %contribution.id, pr_url = %contribution.pr_url, "Contribution recorded");
                    Ok(ContributionOutcome {
                        run_id: run.id(),
                        contribution,
                        stages: run.history().iter().map(|t| t.stage).collect(),
                    })
                }
                Err(cause) => {
                    let failure = run.fail(cause);
                    error!(stage = %failure.stage, error = %failure.cause, "Contribution run failed");
                    Err(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        credential: &Credential,
        request: &ContributionRequest,
    ) -> Result<Contribution, ContributionError> {
        let host = self.host.as_ref();
        let upstream = &request.upstream;

        run.enter(PipelineStage::Forking);
        let fork = ForkCoordinator::new(host)
            .ensure_fork(credential, upstream)
            .await?;
        run.record_fork(fork.clone());

        run.enter(PipelineStage::AwaitingFork);
        ForkReadinessPoller::new(host, self.readiness)
            .wait_until_ready(credential, &fork)
            .await?;

        run.enter(PipelineStage::Branching);
        let branch_name = self.branch_names.next_name();
        let branch = BranchProvisioner::new(host)
            .provision(credential, upstream, &fork, &branch_name)
            .await?;
        run.record_branch(branch.name.clone());

        // Strictly sequential: each commit moves the head the next one builds on.
        let committer = FileCommitter::new(host);
        let total = request.changes.len();
        for (i, change) in request.changes.iter().enumerate() {
            run.enter(PipelineStage::Committing {
                index: i + 1,
                total,
            });
            committer
                .commit(credential, &fork, &branch.name, change)
                .await?;
            run.record_commit();
        }

        run.enter(PipelineStage::OpeningPr);
        let text = PullRequestText::resolve(request.pr_details.as_ref(), upstream, &request.changes);
        let pull_request = PullRequestOpener::new(host)
            .open(credential, upstream, &fork, &branch.name, &branch.base, &text)
            .await?;

        run.enter(PipelineStage::Persisting);
        let draft = NewContribution {
            actor: credential.actor().clone(),
            owner: upstream.owner.clone(),
            repo: upstream.name.clone(),
            fork_owner: fork.owner.clone(),
            branch_name: branch.name,
            pr_url: pull_request.url.clone(),
            pr_number: pull_request.number,
            pr_title: text.title,
            pr_body: text.body,
            challenge_id: request.challenge_id.clone(),
        };
        self.store
            .insert(draft)
            .await
            .map_err(|e| ContributionError::PersistenceFailed {
                pr_url: pull_request.url,
                message: e.to_string(),
            })
    }
}
