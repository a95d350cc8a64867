//! Construction errors and response classification for the GitHub client.

use std::time::Duration;

use pipeline::HostError;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use thiserror::Error;

use crate::models::ApiErrorBody;

/// Errors raised while building a [`crate::GithubClient`].
#[derive(Debug, Error)]
pub enum GithubClientError {
    /// The configured API base URL is unusable.
    #[error("invalid GitHub API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The HTTP client could not be initialised.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Turns a non-success response into a [`HostError`].
pub(crate) async fn classify(response: Response) -> HostError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => parsed.summary(),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body,
    };
    classify_parts(status, &headers, message)
}

fn classify_parts(status: StatusCode, headers: &HeaderMap, message: String) -> HostError {
    match status {
        StatusCode::NOT_FOUND => HostError::NotFound { message },
        StatusCode::UNAUTHORIZED => HostError::Unauthorized { message },
        StatusCode::CONFLICT => HostError::Conflict { message },
        StatusCode::TOO_MANY_REQUESTS => HostError::RateLimited {
            retry_after: retry_after(headers),
        },
        StatusCode::FORBIDDEN if rate_limit_exhausted(headers) => HostError::RateLimited {
            retry_after: retry_after(headers),
        },
        StatusCode::UNPROCESSABLE_ENTITY if message.to_ascii_lowercase().contains("already exists") => {
            HostError::Conflict { message }
        }
        StatusCode::UNPROCESSABLE_ENTITY => HostError::Unprocessable { message },
        other => HostError::Api {
            status: other.as_u16(),
            message,
        },
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    header_str(headers, "x-ratelimit-remaining") == Some("0")
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, "retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
