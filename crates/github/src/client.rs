//! `reqwest`-based implementation of [`SourceHost`] for the GitHub REST API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pipeline::{
    BlobSha, BranchName, CommitRef, CommitSha, Credential, ForkCreation, ForkRef, HostError,
    NewPullRequest, PullRequestNumber, PullRequestRef, PullRequestState, PutFileRequest,
    RepositoryInfo, RepositoryName, RepositoryOwner, RepositoryRef, SourceHost,
};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{classify, GithubClientError};
use crate::models::{
    Account, ContentResponse, CreatePullRequest, CreateRefRequest, ForkResponse,
    PullRequestResponse, PutContentRequest, PutContentResponse, RefResponse, RepositoryResponse,
};

/// Media type GitHub recommends for REST calls.
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// REST API version pinned on every request.
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubClientConfig {
    /// API root, e.g. `https://api.github.com` or `https://ghe.example.com/api/v3`.
    pub api_base_url: String,
    /// `User-Agent` header value; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            user_agent: concat!("upstreamer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// GitHub REST client. One instance serves any number of credentials.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base: Url,
}

impl GithubClient {
    /// Builds a client for the configured API root.
    ///
    /// # Errors
    ///
    /// [`GithubClientError`] if the base URL is not an absolute HTTP(S) URL or
    /// the HTTP client cannot be built.
    pub fn new(config: &GithubClientConfig) -> Result<Self, GithubClientError> {
        let invalid = |reason: &str| GithubClientError::InvalidBaseUrl {
            url: config.api_base_url.clone(),
            reason: reason.to_string(),
        };

        let base = Url::parse(&config.api_base_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path"));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, base })
    }

    /// Builds `<base>/<segments...>`, percent-encoding each segment.
    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, HostError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| HostError::Transport("API base URL cannot carry a path".into()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn repo_endpoint<'s>(
        &self,
        repository: &'s RepositoryRef,
        rest: impl IntoIterator<Item = &'s str>,
    ) -> Result<Url, HostError> {
        self.endpoint(
            ["repos", repository.owner.as_str(), repository.name.as_str()]
                .into_iter()
                .chain(rest),
        )
    }

    fn request(&self, credential: &Credential, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, path = %url.path(), "GitHub request");
        self.http
            .request(method, url)
            .bearer_auth(credential.bearer_token())
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Sends the request; non-2xx responses become [`HostError`]s.
    async fn send(&self, request: RequestBuilder) -> Result<Response, HostError> {
        let response = request
            .send()
            .await
            .map_err(|e| HostError::Transport(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HostError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }
}

fn owner(login: String) -> Result<RepositoryOwner, HostError> {
    RepositoryOwner::new(login).ok_or_else(|| HostError::Decode("empty account login".into()))
}

#[async_trait]
impl SourceHost for GithubClient {
    async fn create_fork(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
    ) -> Result<ForkCreation, HostError> {
        let url = self.repo_endpoint(upstream, ["forks"])?;
        let request = self
            .request(credential, Method::POST, url)
            .json(&serde_json::json!({}));

        match self.send_json::<ForkResponse>(request).await {
            Ok(fork) => Ok(ForkCreation::Created(ForkRef {
                owner: owner(fork.owner.login)?,
                name: RepositoryName::new(fork.name)
                    .ok_or_else(|| HostError::Decode("empty fork name".into()))?,
            })),
            Err(HostError::Conflict { message }) => {
                debug!(upstream = %upstream, %message, "Fork already exists");
                Ok(ForkCreation::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn authenticated_login(
        &self,
        credential: &Credential,
    ) -> Result<RepositoryOwner, HostError> {
        let url = self.endpoint(["user"])?;
        let account: Account = self
            .send_json(self.request(credential, Method::GET, url))
            .await?;
        owner(account.login)
    }

    async fn get_repository(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
    ) -> Result<RepositoryInfo, HostError> {
        let url = self.repo_endpoint(repository, std::iter::empty())?;
        let repo: RepositoryResponse = self
            .send_json(self.request(credential, Method::GET, url))
            .await?;
        Ok(RepositoryInfo {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
        })
    }

    async fn get_branch_head(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        branch: &BranchName,
    ) -> Result<CommitSha, HostError> {
        let url = self.repo_endpoint(
            repository,
            ["git", "ref", "heads"].into_iter().chain(branch.as_str().split('/')),
        )?;
        let reference: RefResponse = self
            .send_json(self.request(credential, Method::GET, url))
            .await?;
        CommitSha::new(reference.object.sha)
            .ok_or_else(|| HostError::Decode("branch reference without a SHA".into()))
    }

    async fn create_branch(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        branch: &BranchName,
        sha: &CommitSha,
    ) -> Result<(), HostError> {
        let url = self.repo_endpoint(repository, ["git", "refs"])?;
        let body = CreateRefRequest {
            reference: format!("refs/heads/{branch}"),
            sha: sha.as_str(),
        };
        self.send(self.request(credential, Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn get_file_sha(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        path: &str,
        branch: &BranchName,
    ) -> Result<Option<BlobSha>, HostError> {
        let mut url = self.repo_endpoint(repository, ["contents"].into_iter().chain(path.split('/')))?;
        url.query_pairs_mut().append_pair("ref", branch.as_str());

        match self
            .send_json::<ContentResponse>(self.request(credential, Method::GET, url))
            .await
        {
            Ok(content) if content.kind == "file" => Ok(BlobSha::new(content.sha)),
            Ok(content) => Err(HostError::Decode(format!(
                "{path} is a {} on {branch}, not a file",
                content.kind
            ))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_file(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        request: &PutFileRequest,
    ) -> Result<CommitRef, HostError> {
        let url = self.repo_endpoint(
            repository,
            ["contents"].into_iter().chain(request.path.split('/')),
        )?;
        let body = PutContentRequest {
            message: &request.message,
            content: BASE64.encode(request.content.as_bytes()),
            branch: request.branch.as_str(),
            sha: request.previous_sha.as_ref().map(BlobSha::as_str),
        };

        let response: PutContentResponse = self
            .send_json(self.request(credential, Method::PUT, url).json(&body))
            .await
            .map_err(|e| match e {
                // A write to an existing file without its SHA is rejected as a validation error.
                HostError::Unprocessable { message } if message.contains("sha") => {
                    HostError::Conflict { message }
                }
                other => other,
            })?;

        CommitSha::new(response.commit.sha)
            .map(|sha| CommitRef { sha })
            .ok_or_else(|| HostError::Decode("commit without a SHA".into()))
    }

    async fn open_pull_request(
        &self,
        credential: &Credential,
        upstream: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<PullRequestRef, HostError> {
        let url = self.repo_endpoint(upstream, ["pulls"])?;
        let body = CreatePullRequest {
            title: &request.title,
            body: &request.body,
            head: &request.head,
            base: request.base.as_str(),
        };
        let pull: PullRequestResponse = self
            .send_json(self.request(credential, Method::POST, url).json(&body))
            .await?;
        Ok(PullRequestRef {
            url: pull.html_url,
            number: PullRequestNumber::new(pull.number),
        })
    }

    async fn get_pull_request(
        &self,
        credential: &Credential,
        repository: &RepositoryRef,
        number: PullRequestNumber,
    ) -> Result<PullRequestState, HostError> {
        let number = number.to_string();
        let url = self.repo_endpoint(repository, ["pulls", number.as_str()])?;
        let pull: PullRequestResponse = self
            .send_json(self.request(credential, Method::GET, url))
            .await?;
        Ok(PullRequestState {
            closed: pull.state.as_deref() == Some("closed"),
            merged: pull.merged.unwrap_or(false) || pull.merged_at.is_some(),
        })
    }
}
