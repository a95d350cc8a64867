//! Behaviour of the individual pipeline stages against the in-memory host.

mod common;

use std::time::Duration;

use common::{credential, repo, FakeHost, FakeRepo, ForkBehaviour, LOGIN};
use nodes::{BranchProvisioner, FileCommitter, ForkCoordinator, ForkReadinessPoller};
use pipeline::{
    BranchName, ContributionError, FileChange, ForkReadinessPolicy, ForkRef, HostError,
    RepositoryName, RepositoryOwner,
};

fn fork_ref(owner: &str) -> ForkRef {
    ForkRef {
        owner: RepositoryOwner::new(owner).unwrap(),
        name: RepositoryName::new("widgets").unwrap(),
    }
}

fn fast_policy(attempts: u32) -> ForkReadinessPolicy {
    ForkReadinessPolicy::new(Duration::from_millis(1), attempts).unwrap()
}

// ---------------------------------------------------------------------------
// Fork coordinator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fork_created_uses_reported_owner() {
    let host = FakeHost::new();
    let fork = ForkCoordinator::new(&host)
        .ensure_fork(&credential(), &repo("acme/widgets"))
        .await
        .unwrap();

    assert_eq!(fork.full_name(), format!("{LOGIN}/widgets"));
    assert!(host.calls_starting_with("authenticated_login").is_empty());
}

#[tokio::test]
async fn test_fork_conflict_resolves_caller_login() {
    let host = FakeHost::new()
        .with_login("devuser")
        .with_fork_behaviour(ForkBehaviour::AlreadyExists);

    let fork = ForkCoordinator::new(&host)
        .ensure_fork(&credential(), &repo("acme/widgets"))
        .await
        .unwrap();

    assert_eq!(fork.owner.as_str(), "devuser");
    assert_ne!(fork.owner.as_str(), "acme");
    assert_eq!(fork.name.as_str(), "widgets");
    assert_eq!(host.calls_starting_with("authenticated_login").len(), 1);
}

#[tokio::test]
async fn test_fork_rejection_is_fork_failed() {
    let host = FakeHost::new().with_fork_behaviour(ForkBehaviour::Fail(HostError::Api {
        status: 403,
        message: "forking is disabled".into(),
    }));

    let err = ForkCoordinator::new(&host)
        .ensure_fork(&credential(), &repo("acme/widgets"))
        .await
        .unwrap_err();

    match err {
        ContributionError::ForkFailed {
            repository,
            message,
        } => {
            assert_eq!(repository, "acme/widgets");
            assert!(message.contains("forking is disabled"), "{message}");
        }
        other => panic!("expected ForkFailed, got {other:?}"),
    }
    assert_eq!(host.calls().len(), 1, "no retry expected");
}

// ---------------------------------------------------------------------------
// Fork readiness poller
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_readiness_waits_out_initial_not_found() {
    let host = FakeHost::new().with_unready_reads("devuser/widgets", 2);
    host.seed("devuser/widgets", FakeRepo::with_main());

    let branch = ForkReadinessPoller::new(&host, fast_policy(5))
        .wait_until_ready(&credential(), &fork_ref("devuser"))
        .await
        .unwrap();

    assert_eq!(branch.as_str(), "main");
    assert_eq!(host.calls_starting_with("get_repository").len(), 3);
}

#[tokio::test]
async fn test_readiness_times_out_on_empty_default_branch() {
    let host = FakeHost::new().with_branchless_fork("devuser/widgets");
    host.seed("devuser/widgets", FakeRepo::with_main());

    let err = ForkReadinessPoller::new(&host, fast_policy(4))
        .wait_until_ready(&credential(), &fork_ref("devuser"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ContributionError::ForkTimeout {
            fork: "devuser/widgets".into(),
            attempts: 4
        }
    );
    assert_eq!(host.calls_starting_with("get_repository").len(), 4);
}

#[tokio::test]
async fn test_readiness_retries_server_errors() {
    let host = FakeHost::new().with_repository_errors(
        "devuser/widgets",
        vec![HostError::Api {
            status: 502,
            message: "Bad Gateway".into(),
        }],
    );
    host.seed("devuser/widgets", FakeRepo::with_main());

    let branch = ForkReadinessPoller::new(&host, fast_policy(3))
        .wait_until_ready(&credential(), &fork_ref("devuser"))
        .await
        .unwrap();

    assert_eq!(branch.as_str(), "main");
    assert_eq!(host.calls_starting_with("get_repository").len(), 2);
}

#[tokio::test]
async fn test_readiness_stops_on_client_errors() {
    let host = FakeHost::new().with_repository_errors(
        "devuser/widgets",
        vec![HostError::Api {
            status: 403,
            message: "Resource not accessible by integration".into(),
        }],
    );
    host.seed("devuser/widgets", FakeRepo::with_main());

    let err = ForkReadinessPoller::new(&host, fast_policy(5))
        .wait_until_ready(&credential(), &fork_ref("devuser"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ContributionError::ForkFailed { ref repository, .. } if repository == "devuser/widgets"),
        "{err:?}"
    );
    assert_eq!(host.calls_starting_with("get_repository").len(), 1);
}

#[tokio::test]
async fn test_readiness_times_out_when_fork_never_appears() {
    let host = FakeHost::new();

    let err = ForkReadinessPoller::new(&host, fast_policy(3))
        .wait_until_ready(&credential(), &fork_ref("devuser"))
        .await
        .unwrap_err();

    assert!(matches!(err, ContributionError::ForkTimeout { attempts: 3, .. }));
}

// ---------------------------------------------------------------------------
// Branch provisioner
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_branch_is_cut_from_fork_head_of_upstream_default() {
    let host = FakeHost::new();
    let mut upstream = FakeRepo::with_main();
    upstream.default_branch = "trunk".into();
    upstream
        .branches
        .insert("trunk".into(), vec!["upstream-head".into()]);
    host.seed("acme/widgets", upstream);

    let mut fork = FakeRepo::with_main();
    fork.branches
        .insert("trunk".into(), vec!["fork-head".into()]);
    host.seed("devuser/widgets", fork);

    let branch = BranchName::new("contrib-1").unwrap();
    let provisioned = BranchProvisioner::new(&host)
        .provision(
            &credential(),
            &repo("acme/widgets"),
            &fork_ref("devuser"),
            &branch,
        )
        .await
        .unwrap();

    assert_eq!(provisioned.base.as_str(), "trunk");
    assert_eq!(provisioned.base_sha.as_str(), "fork-head");
    assert_eq!(
        host.calls_starting_with("get_branch_head"),
        vec!["get_branch_head devuser/widgets@trunk".to_string()]
    );
    let fork = host.repo_state("devuser/widgets").unwrap();
    assert_eq!(fork.branches["contrib-1"], vec!["fork-head".to_string()]);
}

#[tokio::test]
async fn test_existing_branch_is_a_conflict_not_renamed() {
    let host = FakeHost::new();
    let mut fork = FakeRepo::with_main();
    fork.branches
        .insert("contrib-1".into(), vec!["old".into()]);
    host.seed("devuser/widgets", fork);

    let err = BranchProvisioner::new(&host)
        .provision(
            &credential(),
            &repo("acme/widgets"),
            &fork_ref("devuser"),
            &BranchName::new("contrib-1").unwrap(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, ContributionError::BranchCreateConflict { ref branch, .. } if branch.as_str() == "contrib-1"),
        "{err:?}"
    );
    assert_eq!(host.calls_starting_with("create_branch").len(), 1);
}

#[tokio::test]
async fn test_missing_fork_head_is_resolution_failure() {
    let host = FakeHost::new();

    let err = BranchProvisioner::new(&host)
        .provision(
            &credential(),
            &repo("acme/widgets"),
            &fork_ref("devuser"),
            &BranchName::new("contrib-1").unwrap(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, ContributionError::BranchResolutionFailed { .. }),
        "{err:?}"
    );
    assert!(host.calls_starting_with("create_branch").is_empty());
}

// ---------------------------------------------------------------------------
// File committer
// ---------------------------------------------------------------------------

fn fork_with_branch(host: &FakeHost) -> BranchName {
    let mut fork = FakeRepo::with_main();
    fork.branches
        .insert("contrib-1".into(), vec!["root-commit".into()]);
    host.seed("devuser/widgets", fork);
    BranchName::new("contrib-1").unwrap()
}

#[tokio::test]
async fn test_new_file_is_created_without_sha() {
    let host = FakeHost::new();
    let branch = fork_with_branch(&host);

    FileCommitter::new(&host)
        .commit(
            &credential(),
            &fork_ref("devuser"),
            &branch,
            &FileChange::new("docs/new.md", "hello\n"),
        )
        .await
        .unwrap();

    let fork = host.repo_state("devuser/widgets").unwrap();
    assert_eq!(fork.file("contrib-1", "docs/new.md"), Some("hello\n"));
    assert_eq!(fork.history_len("contrib-1"), 2);
}

#[tokio::test]
async fn test_existing_file_is_updated_with_its_sha() {
    let host = FakeHost::new();
    let branch = fork_with_branch(&host);
    host.seed_file("devuser/widgets", "contrib-1", "README.md", "old\n");

    FileCommitter::new(&host)
        .commit(
            &credential(),
            &fork_ref("devuser"),
            &branch,
            &FileChange::new("README.md", "new\n"),
        )
        .await
        .unwrap();

    let fork = host.repo_state("devuser/widgets").unwrap();
    assert_eq!(fork.file("contrib-1", "README.md"), Some("new\n"));
}

#[tokio::test]
async fn test_empty_path_fails_without_writing() {
    let host = FakeHost::new();
    let branch = fork_with_branch(&host);

    let err = FileCommitter::new(&host)
        .commit(
            &credential(),
            &fork_ref("devuser"),
            &branch,
            &FileChange::new("", "content"),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, ContributionError::FileCommitFailed { ref path, .. } if path.is_empty()),
        "{err:?}"
    );
    assert!(host.calls_starting_with("put_file").is_empty());
}

#[tokio::test]
async fn test_escaping_path_is_rejected() {
    let host = FakeHost::new();
    let branch = fork_with_branch(&host);

    let err = FileCommitter::new(&host)
        .commit(
            &credential(),
            &fork_ref("devuser"),
            &branch,
            &FileChange::new("../secrets.txt", "content"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ContributionError::FileCommitFailed { .. }), "{err:?}");
    assert!(host.calls().is_empty());
}
