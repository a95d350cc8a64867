//! Explicit state machine for one contribution run.
//!
//! A run moves strictly forward through
//! `Init → Forking → AwaitingFork → Branching → Committing(1..=N) → OpeningPr
//! → Persisting → Persisted`, or stops in `Failed(stage, cause)`. The
//! [`PipelineRun`] tracker records each transition together with the host
//! artefacts created so far, so a failure can report exactly where it stopped.

use serde::{Deserialize, Serialize};

use crate::{
    BranchName, ContributionError, ContributionId, ForkRef, Leftovers, PipelineFailure,
    PipelineRunId, Timestamp,
};

/// One step of the contribution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineStage {
    /// Run created; the credential has not been used yet.
    Init,
    /// Requesting the fork of the upstream repository.
    Forking,
    /// Polling until the fork is readable and has a default branch.
    AwaitingFork,
    /// Cutting the contribution branch on the fork.
    Branching,
    /// Writing change `index` of `total` (1-based).
    Committing {
        /// 1-based position of the change being written.
        index: usize,
        /// Number of changes in the request.
        total: usize,
    },
    /// Opening the pull request against the upstream default branch.
    OpeningPr,
    /// Writing the contribution record.
    Persisting,
    /// Terminal success: the record exists.
    Persisted,
}

impl PipelineStage {
    /// Position of the stage in the forward order. Commit stages order by index.
    fn rank(self) -> (u8, usize) {
        match self {
            Self::Init => (0, 0),
            Self::Forking => (1, 0),
            Self::AwaitingFork => (2, 0),
            Self::Branching => (3, 0),
            Self::Committing { index, .. } => (4, index),
            Self::OpeningPr => (5, 0),
            Self::Persisting => (6, 0),
            Self::Persisted => (7, 0),
        }
    }

    /// Returns `true` if moving from `self` to `next` goes forward.
    pub fn precedes(self, next: PipelineStage) -> bool {
        self.rank() < next.rank()
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => f.write_str("initialising"),
            Self::Forking => f.write_str("forking"),
            Self::AwaitingFork => f.write_str("awaiting fork"),
            Self::Branching => f.write_str("branching"),
            Self::Committing { index, total } => write!(f, "committing ({index}/{total})"),
            Self::OpeningPr => f.write_str("opening pull request"),
            Self::Persisting => f.write_str("persisting"),
            Self::Persisted => f.write_str("persisted"),
        }
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Still executing the given stage.
    Active(PipelineStage),
    /// Finished; the contribution record was written.
    Persisted(ContributionId),
    /// Stopped for good.
    Failed {
        /// Stage that was active when the run stopped.
        stage: PipelineStage,
        /// What stopped it.
        cause: ContributionError,
    },
}

impl RunState {
    /// Returns `true` once the run cannot move any more.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active(_))
    }
}

/// A recorded stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    /// Stage entered.
    pub stage: PipelineStage,
    /// When it was entered.
    pub at: Timestamp,
}

/// Tracks a single run through its stages.
///
/// Owned by the task executing the run; never shared.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    id: PipelineRunId,
    state: RunState,
    history: Vec<StageTransition>,
    leftovers: Leftovers,
}

impl PipelineRun {
    /// Starts a new run in [`PipelineStage::Init`].
    pub fn start() -> Self {
        Self {
            id: PipelineRunId::new_random(),
            state: RunState::Active(PipelineStage::Init),
            history: vec![StageTransition {
                stage: PipelineStage::Init,
                at: Timestamp::now(),
            }],
            leftovers: Leftovers::default(),
        }
    }

    pub fn id(&self) -> PipelineRunId {
        self.id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Every stage entered so far, in order.
    pub fn history(&self) -> &[StageTransition] {
        &self.history
    }

    /// The stage currently executing, or the stage a terminal run stopped in.
    pub fn current_stage(&self) -> PipelineStage {
        match &self.state {
            RunState::Active(stage) => *stage,
            RunState::Persisted(_) => PipelineStage::Persisted,
            RunState::Failed { stage, .. } => *stage,
        }
    }

    /// Moves the run to `next`.
    ///
    /// Terminal runs and backward moves are ignored and logged; the executor
    /// never issues them.
    pub fn enter(&mut self, next: PipelineStage) {
        let current = match &self.state {
            RunState::Active(stage) => *stage,
            terminal => {
                tracing::error!(run_id = %self.id, state = ?terminal, next = %next, "Stage change on a finished run ignored");
                return;
            }
        };
        if !current.precedes(next) {
            tracing::error!(run_id = %self.id, current = %current, next = %next, "Backward stage change ignored");
            return;
        }

        tracing::debug!(run_id = %self.id, stage = %next, "Entering stage");
        self.state = RunState::Active(next);
        self.history.push(StageTransition {
            stage: next,
            at: Timestamp::now(),
        });
    }

    pub fn record_fork(&mut self, fork: ForkRef) {
        self.leftovers.fork = Some(fork);
    }

    pub fn record_branch(&mut self, branch: BranchName) {
        self.leftovers.branch = Some(branch);
    }

    pub fn record_commit(&mut self) {
        self.leftovers.commits_applied += 1;
    }

    /// Host artefacts created so far.
    pub fn leftovers(&self) -> &Leftovers {
        &self.leftovers
    }

    /// Marks the run persisted.
    pub fn complete(&mut self, contribution: ContributionId) {
        self.enter(PipelineStage::Persisted);
        self.state = RunState::Persisted(contribution);
    }

    /// Stops the run in the current stage and produces the failure report.
    pub fn fail(&mut self, cause: ContributionError) -> PipelineFailure {
        let stage = self.current_stage();
        self.state = RunState::Failed {
            stage,
            cause: cause.clone(),
        };
        PipelineFailure {
            run_id: self.id,
            stage,
            cause,
            leftovers: self.leftovers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_order_forward() {
        assert!(PipelineStage::Init.precedes(PipelineStage::Forking));
        assert!(PipelineStage::Branching.precedes(PipelineStage::Committing { index: 1, total: 2 }));
        assert!(PipelineStage::Committing { index: 1, total: 2 }
            .precedes(PipelineStage::Committing { index: 2, total: 2 }));
        assert!(!PipelineStage::OpeningPr.precedes(PipelineStage::Forking));
        assert!(!PipelineStage::Forking.precedes(PipelineStage::Forking));
    }

    #[test]
    fn test_run_ignores_backward_transitions() {
        let mut run = PipelineRun::start();
        run.enter(PipelineStage::Forking);
        run.enter(PipelineStage::Branching);
        run.enter(PipelineStage::Forking);

        assert_eq!(run.current_stage(), PipelineStage::Branching);
        let stages: Vec<_> = run.history().iter().map(|t| t.stage).collect();
        assert_eq!(
            stages,
            vec![
                PipelineStage::Init,
                PipelineStage::Forking,
                PipelineStage::Branching
            ]
        );
    }

    #[test]
    fn test_fail_reports_current_stage_and_leftovers() {
        let mut run = PipelineRun::start();
        run.enter(PipelineStage::Forking);
        run.record_fork(ForkRef {
            owner: crate::RepositoryOwner::new("devuser").unwrap(),
            name: crate::RepositoryName::new("widgets").unwrap(),
        });
        run.enter(PipelineStage::AwaitingFork);

        let failure = run.fail(ContributionError::ForkTimeout {
            fork: "devuser/widgets".into(),
            attempts: 2,
        });

        assert_eq!(failure.stage, PipelineStage::AwaitingFork);
        assert_eq!(failure.run_id, run.id());
        assert_eq!(
            failure.leftovers.fork.as_ref().map(ForkRef::full_name).as_deref(),
            Some("devuser/widgets")
        );
        assert!(run.state().is_terminal());

        run.enter(PipelineStage::Branching);
        assert_eq!(run.current_stage(), PipelineStage::AwaitingFork);
    }

    #[test]
    fn test_complete_ends_in_persisted() {
        let mut run = PipelineRun::start();
        run.enter(PipelineStage::Persisting);
        let id = ContributionId::new_random();
        run.complete(id);
        assert_eq!(run.state(), &RunState::Persisted(id));
        assert_eq!(run.current_stage(), PipelineStage::Persisted);
    }
}
