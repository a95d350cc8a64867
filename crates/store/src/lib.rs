//! Upstreamer contribution storage.
//!
//! Implements the [`pipeline::ContributionStore`] port twice:
//!
//! - [`InMemoryContributionStore`]: process-local; used by tests and by
//!   callers that persist records elsewhere.
//! - [`JsonFileContributionStore`]: a single JSON document on disk; used by
//!   the CLI.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Storage format and file handling live here. The
//! [`pipeline`] crate sees only [`pipeline::ContributionStore`].

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileContributionStore;
pub use memory::InMemoryContributionStore;
