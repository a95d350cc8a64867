//! Upstreamer GitHub infrastructure adapter.
//!
//! Implements the [`pipeline::SourceHost`] trait over the GitHub REST API with
//! [`reqwest`]. Used both against `api.github.com` and GitHub Enterprise
//! (`https://<host>/api/v3`).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! URL construction, authentication headers, payload encoding (base64 file
//! content) and mapping of HTTP statuses to [`pipeline::HostError`] are handled
//! here; the [`pipeline`] crate never sees them. Nothing is retried here.
//!
//! ## Status mapping
//!
//! | Response | [`pipeline::HostError`] |
//! |----------|-------------------------|
//! | 404 | `NotFound` |
//! | 401 | `Unauthorized` |
//! | 409, or 422 "... already exists" | `Conflict` |
//! | 422 mentioning `sha` on a contents write | `Conflict` |
//! | other 422 | `Unprocessable` |
//! | 429, or 403 with `x-ratelimit-remaining: 0` | `RateLimited` |
//! | anything else | `Api { status, .. }` |

pub mod client;
pub mod error;
mod models;

pub use client::{GithubClient, GithubClientConfig};
pub use error::GithubClientError;
