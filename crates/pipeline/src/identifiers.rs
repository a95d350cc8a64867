//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example, a
//! fork owner's [`RepositoryOwner`] with the [`ActorId`] that started a run, even
//! though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes (internally generated).
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), Display.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates the identifier from an existing UUID (e.g. deserialised from state).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: GitHub-integer-backed
// ---------------------------------------------------------------------------

/// A pull request number, assigned by GitHub and unique within one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a new identifier from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies a single pipeline execution run.
    ///
    /// Generated fresh for every call to the executor; attached to the run's
    /// tracing span and to any failure so all activity from one run can be
    /// correlated.
    PipelineRunId
}

uuid_id! {
    /// Identifies a persisted [`crate::Contribution`] record.
    ///
    /// Assigned by the contribution store when the record is inserted.
    ContributionId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (GitHub / Git names)
// ---------------------------------------------------------------------------

string_id! {
    /// The account (user or organisation) that owns a repository.
    ///
    /// Also used for the authenticated login returned by `GET /user`, since a
    /// fork always lives under that login.
    RepositoryOwner
}

string_id! {
    /// The repository name, without the owner (e.g. `"widgets"`).
    RepositoryName
}

string_id! {
    /// A Git branch name (e.g. `"main"`, `"contrib-1729350000000"`).
    BranchName
}

string_id! {
    /// A Git commit SHA (40-character lowercase hex string).
    CommitSha
}

string_id! {
    /// The blob SHA of a file's current content, required by the contents API
    /// to overwrite an existing file.
    BlobSha
}

string_id! {
    /// The identity inside this system that initiated a run.
    ///
    /// This is the session user, not the GitHub login; the two are tracked
    /// separately on the contribution record.
    ActorId
}

string_id! {
    /// Optional foreign reference to the challenge or task a contribution
    /// answers. Not interpreted by the pipeline.
    ChallengeId
}

// ---------------------------------------------------------------------------
// Composite references
// ---------------------------------------------------------------------------

/// A repository on the host, addressed as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Account that owns the repository.
    pub owner: RepositoryOwner,
    /// Repository name.
    pub name: RepositoryName,
}

impl RepositoryRef {
    /// Creates a reference from its two parts.
    pub fn new(owner: RepositoryOwner, name: RepositoryName) -> Self {
        Self { owner, name }
    }

    /// Parses an `owner/name` string.
    ///
    /// Returns `None` unless the value has exactly two non-empty segments.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if name.contains('/') {
            return None;
        }
        Some(Self {
            owner: RepositoryOwner::new(owner)?,
            name: RepositoryName::new(name)?,
        })
    }

    /// Returns the `owner/name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
