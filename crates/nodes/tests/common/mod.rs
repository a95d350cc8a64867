//! In-memory `SourceHost` used by the stage and executor tests.
//!
//! Models just enough of GitHub to observe the pipeline: repositories with a
//! default branch, branches as commit histories, files with blob SHAs, pull
//! requests, and a log of every call made.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use pipeline::{
    ActorId, BlobSha, BranchName, CommitRef, CommitSha, Credential, ForkCreation, ForkRef,
    HostError, NewPullRequest, PullRequestNumber, PullRequestRef, PullRequestState,
    PutFileRequest, RepositoryInfo, RepositoryName, RepositoryOwner, RepositoryRef, SourceHost,
};

pub const LOGIN: &str = "devuser";

pub fn credential() -> Credential {
    Credential::from_token(ActorId::new("session-user").unwrap(), Some("token".into())).unwrap()
}

pub fn repo(full_name: &str) -> RepositoryRef {
    RepositoryRef::parse(full_name).unwrap()
}

/// How the fake answers the fork request.
#[derive(Debug, Clone)]
pub enum ForkBehaviour {
    /// Create `<LOGIN>/<name>` and report it.
    Create,
    /// Report "already exists"; the fork must already be seeded.
    AlreadyExists,
    /// Fail with the given error.
    Fail(HostError),
}

#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub default_branch: String,
    /// Branch name → commit SHAs, oldest first.
    pub branches: HashMap<String, Vec<String>>,
    /// (branch, path) → (content, blob SHA).
    pub files: HashMap<(String, String), (String, String)>,
}

impl FakeRepo {
    pub fn with_main() -> Self {
        let mut branches = HashMap::new();
        branches.insert("main".to_string(), vec!["root-commit".to_string()]);
        Self {
            default_branch: "main".into(),
            branches,
            files: HashMap::new(),
        }
    }

    /// Number of commits on `branch`.
    pub fn history_len(&self, branch: &str) -> usize {
        self.branches.get(branch).map_or(0, Vec::len)
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<&str> {
        self.files
            .get(&(branch.to_string(), path.to_string()))
            .map(|(content, _)| content.as_str())
    }
}

#[derive(Debug, Default)]
struct State {
    repos: HashMap<String, FakeRepo>,
    /// Reads of a fork left to answer with 404 before it becomes visible.
    unready_reads: HashMap<String, u32>,
    /// Forks whose default branch stays empty forever.
    branchless: Vec<String>,
    /// Errors returned, in order, by the next repository reads.
    repository_errors: HashMap<String, VecDeque<HostError>>,
    pulls: HashMap<String, Vec<(NewPullRequest, PullRequestState)>>,
    counter: u64,
    calls: Vec<String>,
}

pub struct FakeHost {
    login: String,
    fork_behaviour: ForkBehaviour,
    branch_error: Option<HostError>,
    pull_error: Option<HostError>,
    state: Mutex<State>,
}

impl FakeHost {
    /// A host holding `acme/widgets` with a `main` branch.
    pub fn new() -> Self {
        let host = Self {
            login: LOGIN.into(),
            fork_behaviour: ForkBehaviour::Create,
            branch_error: None,
            pull_error: None,
            state: Mutex::new(State::default()),
        };
        host.seed("acme/widgets", FakeRepo::with_main());
        host
    }

    pub fn with_login(mut self, login: &str) -> Self {
        self.login = login.into();
        self
    }

    pub fn with_fork_behaviour(mut self, behaviour: ForkBehaviour) -> Self {
        self.fork_behaviour = behaviour;
        self
    }

    pub fn with_branch_error(mut self, error: HostError) -> Self {
        self.branch_error = Some(error);
        self
    }

    pub fn with_pull_error(mut self, error: HostError) -> Self {
        self.pull_error = Some(error);
        self
    }

    /// The fork answers 404 for its first `reads` reads.
    pub fn with_unready_reads(self, fork: &str, reads: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .unready_reads
            .insert(fork.into(), reads);
        self
    }

    /// The next reads of `repository` fail with `errors`, in order.
    pub fn with_repository_errors(self, repository: &str, errors: Vec<HostError>) -> Self {
        self.state
            .lock()
            .unwrap()
            .repository_errors
            .insert(repository.into(), errors.into());
        self
    }

    /// The fork never reports a default branch.
    pub fn with_branchless_fork(self, fork: &str) -> Self {
        self.state.lock().unwrap().branchless.push(fork.into());
        self
    }

    pub fn seed(&self, full_name: &str, repo: FakeRepo) {
        self.state
            .lock()
            .unwrap()
            .repos
            .insert(full_name.into(), repo);
    }

    pub fn seed_file(&self, full_name: &str, branch: &str, path: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        state.counter += 1;
        let sha = format!("blob-{}", state.counter);
        state
            .repos
            .get_mut(full_name)
            .expect("seeded repository")
            .files
            .insert((branch.into(), path.into()), (content.into(), sha));
    }

    pub fn repo_state(&self, full_name: &str) -> Option<FakeRepo> {
        self.state.lock().unwrap().repos.get(full_name).cloned()
    }

    /// Every call made, as `"<operation> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn opened_pulls(&self, upstream: &str) -> Vec<NewPullRequest> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .get(upstream)
            .map(|p| p.iter().map(|(req, _)| req.clone()).collect())
            .unwrap_or_default()
    }

    /// Marks pull request `number` of `upstream` as closed/merged.
    pub fn set_pull_state(&self, upstream: &str, number: u64, state: PullRequestState) {
        let mut guard = self.state.lock().unwrap();
        let pulls = guard.pulls.get_mut(upstream).expect("pull requests");
        pulls[(number - 1) as usize].1 = state;
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn not_found(what: &str) -> HostError {
    HostError::NotFound {
        message: format!("{what} Not Found"),
    }
}

#[async_trait]
impl SourceHost for FakeHost {
    async fn create_fork(
        &self,
        _credential: &Credential,
        upstream: &RepositoryRef,
    ) -> Result<ForkCreation, HostError> {
        self.record(format!("create_fork {upstream}"));
        match &self.fork_behaviour {
            ForkBehaviour::Fail(e) => Err(e.clone()),
            ForkBehaviour::AlreadyExists => Ok(ForkCreation::AlreadyExists),
            ForkBehaviour::Create => {
                let mut state = self.state.lock().unwrap();
                let source = state
                    .repos
                    .get(&upstream.full_name())
                    .cloned()
                    .ok_or_else(|| not_found("upstream"))?;
                let fork = format!("{}/{}", self.login, upstream.name);
                state.repos.entry(fork).or_insert(source);
                Ok(ForkCreation::Created(ForkRef {
                    owner: RepositoryOwner::new(self.login.clone()).unwrap(),
                    name: RepositoryName::new(upstream.name.as_str()).unwrap(),
                }))
            }
        }
    }

    async fn authenticated_login(
        &self,
        _credential: &Credential,
    ) -> Result<RepositoryOwner, HostError> {
        self.record("authenticated_login".into());
        Ok(RepositoryOwner::new(self.login.clone()).unwrap())
    }

    async fn get_repository(
        &self,
        _credential: &Credential,
        repository: &RepositoryRef,
    ) -> Result<RepositoryInfo, HostError> {
        let name = repository.full_name();
        self.record(format!("get_repository {name}"));
        let mut state = self.state.lock().unwrap();

        if let Some(error) = state
            .repository_errors
            .get_mut(&name)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(remaining) = state.unready_reads.get_mut(&name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(not_found("repository"));
            }
        }
        let branchless = state.branchless.contains(&name);
        let repo = state.repos.get(&name).ok_or_else(|| not_found("repository"))?;
        Ok(RepositoryInfo {
            full_name: name,
            default_branch: if branchless {
                Some(String::new())
            } else {
                Some(repo.default_branch.clone())
            },
        })
    }

    async fn get_branch_head(
        &self,
        _credential: &Credential,
        repository: &RepositoryRef,
        branch: &BranchName,
    ) -> Result<CommitSha, HostError> {
        self.record(format!("get_branch_head {repository}@{branch}"));
        let state = self.state.lock().unwrap();
        let head = state
            .repos
            .get(&repository.full_name())
            .and_then(|r| r.branches.get(branch.as_str()))
            .and_then(|h| h.last())
            .ok_or_else(|| not_found("branch"))?;
        Ok(CommitSha::new(head.clone()).unwrap())
    }

    async fn create_branch(
        &self,
        _credential: &Credential,
        repository: &RepositoryRef,
        branch: &BranchName,
        sha: &CommitSha,
    ) -> Result<(), HostError> {
        self.record(format!("create_branch {repository}@{branch}"));
        if let Some(e) = &self.branch_error {
            return Err(e.clone());
        }
        let mut state = self.state.lock().unwrap();
        let repo = state
            .repos
            .get_mut(&repository.full_name())
            .ok_or_else(|| not_found("repository"))?;
        if repo.branches.contains_key(branch.as_str()) {
            return Err(HostError::Conflict {
                message: "Reference already exists".into(),
            });
        }

        // The new branch shares history up to `sha` and sees the same files.
        let history = repo
            .branches
            .values()
            .find(|h| h.last().map(String::as_str) == Some(sha.as_str()))
            .cloned()
            .ok_or_else(|| HostError::Unprocessable {
                message: "Object does not exist".into(),
            })?;
        let base_branch = repo
            .branches
            .iter()
            .find(|(_, h)| h.last().map(String::as_str) == Some(sha.as_str()))
            .map(|(name, _)| name.clone());
        if let Some(base_branch) = base_branch {
            let copied: Vec<_> = repo
                .files
                .iter()
                .filter(|((b, _), _)| *b == base_branch)
                .map(|((_, path), value)| ((branch.to_string(), path.clone()), value.clone()))
                .collect();
            repo.files.extend(copied);
        }
        repo.branches.insert(branch.to_string(), history);
        Ok(())
    }

    async fn get_file_sha(
        &self,
        _credential: &Credential,
        repository: &RepositoryRef,
        path: &str,
        branch: &BranchName,
    ) -> Result<Option<BlobSha>, HostError> {
        self.record(format!("get_file_sha {repository}@{branch}:{path}"));
        let state = self.state.lock().unwrap();
        let repo = state
            .repos
            .get(&repository.full_name())
            .ok_or_else(|| not_found("repository"))?;
        Ok(repo
            .files
            .get(&(branch.to_string(), path.to_string()))
            .and_then(|(_, sha)| BlobSha::new(sha.clone())))
    }

    async fn put_file(
        &self,
        _credential: &Credential,
        repository: &RepositoryRef,
        request: &PutFileRequest,
    ) -> Result<CommitRef, HostError> {
        self.record(format!(
            "put_file {repository}@{}:{}",
            request.branch, request.path
        ));
        if request.path.is_empty() {
            return Err(HostError::Unprocessable {
                message: "path is empty".into(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.counter += 1;
        let n = state.counter;
        let repo = state
            .repos
            .get_mut(&repository.full_name())
            .ok_or_else(|| not_found("repository"))?;
        let key = (request.branch.to_string(), request.path.clone());

        let current = repo.files.get(&key).map(|(_, sha)| sha.as_str());
        let supplied = request.previous_sha.as_ref().map(BlobSha::as_str);
        if current != supplied {
            return Err(HostError::Conflict {
                message: format!("{} does not match", request.path),
            });
        }

        let history = repo
            .branches
            .get_mut(request.branch.as_str())
            .ok_or_else(|| not_found("branch"))?;
        let commit = format!("commit-{n}");
        history.push(commit.clone());
        repo.files
            .insert(key, (request.content.clone(), format!("blob-{n}")));

        Ok(CommitRef {
            sha: CommitSha::new(commit).unwrap(),
        })
    }

    async fn open_pull_request(
        &self,
        _credential: &Credential,
        upstream: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<PullRequestRef, HostError> {
        self.record(format!("open_pull_request {upstream} {}", request.head));
        if let Some(e) = &self.pull_error {
            return Err(e.clone());
        }
        let mut state = self.state.lock().unwrap();
        let pulls = state.pulls.entry(upstream.full_name()).or_default();
        pulls.push((
            request.clone(),
            PullRequestState {
                closed: false,
                merged: false,
            },
        ));
        let number = pulls.len() as u64;
        Ok(PullRequestRef {
            url: format!("https://github.com/{upstream}/pull/{number}"),
            number: PullRequestNumber::new(number),
        })
    }

    async fn get_pull_request(
        &self,
        _credential: &Credential,
        repository: &RepositoryRef,
        number: PullRequestNumber,
    ) -> Result<PullRequestState, HostError> {
        self.record(format!("get_pull_request {repository}#{number}"));
        let state = self.state.lock().unwrap();
        state
            .pulls
            .get(&repository.full_name())
            .and_then(|p| p.get((number.as_u64() - 1) as usize))
            .map(|(_, s)| *s)
            .ok_or_else(|| not_found("pull request"))
    }
}
