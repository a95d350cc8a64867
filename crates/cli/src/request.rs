//! Turns `submit` arguments into a [`ContributionRequest`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pipeline::{ChallengeId, ContributionRequest, FileChange, PrDetails, RepositoryRef};

/// One `--file <repo-path>=<local-file>` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArg {
    pub repo_path: String,
    pub local_path: PathBuf,
}

/// Parses `<repo-path>=<local-file>`. Used as a clap value parser.
///
/// The repository path is passed through untouched; the pipeline validates it.
pub fn parse_file_arg(raw: &str) -> Result<FileArg, String> {
    let (repo_path, local) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <repo-path>=<local-file>, got {raw:?}"))?;
    if local.is_empty() {
        return Err(format!("missing local file in {raw:?}"));
    }
    Ok(FileArg {
        repo_path: repo_path.to_string(),
        local_path: PathBuf::from(local),
    })
}

/// Everything `submit` collects from the command line.
#[derive(Debug, Clone, Default)]
pub struct SubmitArgs {
    pub repo: String,
    pub files: Vec<FileArg>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub description: Option<String>,
    pub challenge_id: Option<String>,
}

impl SubmitArgs {
    /// Reads every local file and assembles the request, keeping `--file` order.
    pub fn into_request(self, base_dir: &Path) -> Result<ContributionRequest> {
        let Some(upstream) = RepositoryRef::parse(&self.repo) else {
            bail!("--repo must be <owner>/<name>, got {:?}", self.repo);
        };

        let mut changes = Vec::with_capacity(self.files.len());
        for file in self.files {
            let local = base_dir.join(&file.local_path);
            let content = std::fs::read_to_string(&local)
                .with_context(|| format!("failed to read {}", local.display()))?;
            changes.push(FileChange::new(file.repo_path, content));
        }

        let pr_details = if self.title.is_some() || self.body.is_some() || self.description.is_some()
        {
            Some(PrDetails {
                title: self.title,
                body: self.body,
                description: self.description,
            })
        } else {
            None
        };

        let challenge_id = match self.challenge_id {
            Some(raw) => Some(
                ChallengeId::new(raw).context("--challenge-id must not be empty")?,
            ),
            None => None,
        };

        Ok(ContributionRequest {
            upstream,
            changes,
            pr_details,
            challenge_id,
        })
    }
}
