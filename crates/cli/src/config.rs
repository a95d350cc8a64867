//! `.upstreamer/config.toml` loading and validation.
//!
//! Every section and key is optional; a missing file yields the defaults.
//! Values that cannot be used are rejected here, before any host call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use github::GithubClientConfig;
use pipeline::ForkReadinessPolicy;
use serde::Deserialize;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".upstreamer/config.toml";

/// Default location of the contribution store.
pub const DEFAULT_STORE_PATH: &str = ".upstreamer/contributions.json";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub github: GithubSection,
    pub fork_readiness: ForkReadinessSection,
    pub store: StoreSection,
}

/// `[github]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubSection {
    pub api_base_url: String,
    pub user_agent: String,
}

impl Default for GithubSection {
    fn default() -> Self {
        let defaults = GithubClientConfig::default();
        Self {
            api_base_url: defaults.api_base_url,
            user_agent: defaults.user_agent,
        }
    }
}

/// `[fork_readiness]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForkReadinessSection {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for ForkReadinessSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: ForkReadinessPolicy::DEFAULT_INTERVAL.as_millis() as u64,
            max_attempts: ForkReadinessPolicy::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl Config {
    /// Loads the configuration at `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let base = self.github.api_base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            bail!("github.api_base_url must be an http(s) URL, got {base:?}");
        }
        if self.github.user_agent.trim().is_empty() {
            bail!("github.user_agent must not be empty");
        }
        if self.fork_readiness.max_attempts == 0 {
            bail!("fork_readiness.max_attempts must be at least 1");
        }
        if self.store.path.as_os_str().is_empty() {
            bail!("store.path must not be empty");
        }
        Ok(())
    }

    /// Settings for the GitHub adapter.
    pub fn github_client(&self) -> GithubClientConfig {
        GithubClientConfig {
            api_base_url: self.github.api_base_url.trim().to_string(),
            user_agent: self.github.user_agent.clone(),
        }
    }

    /// The fork readiness policy.
    pub fn readiness_policy(&self) -> Result<ForkReadinessPolicy> {
        ForkReadinessPolicy::new(
            Duration::from_millis(self.fork_readiness.poll_interval_ms),
            self.fork_readiness.max_attempts,
        )
        .context("fork_readiness.max_attempts must be at least 1")
    }
}
