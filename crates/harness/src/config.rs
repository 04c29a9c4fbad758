//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::azure::ArmConfig;
use crate::error::HarnessResult;
use crate::options::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Harness configuration, read from `tfprobe.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Terraform binary (name on PATH or absolute path)
    pub terraform_binary: PathBuf,

    /// How many scenarios may run at once
    pub parallelism: usize,

    /// Where suite results are written
    pub results_dir: PathBuf,

    /// Retry defaults for terraform commands
    pub retry: RetryConfig,

    /// Azure Resource Manager endpoints
    pub arm: ArmConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            terraform_binary: PathBuf::from("terraform"),
            parallelism: 2,
            results_dir: PathBuf::from("test-results"),
            retry: RetryConfig::default(),
            arm: ArmConfig::default(),
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_secs: u64,
    /// Extra retryable patterns on top of the built-in transient errors
    pub extra_patterns: Vec<RetryPattern>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            extra_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPattern {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

impl RetryConfig {
    /// Build the policy: built-in transient errors plus the extra patterns
    pub fn policy(&self) -> HarnessResult<RetryPolicy> {
        let mut policy = RetryPolicy::transient_defaults()
            .with_max_retries(self.max_retries)
            .with_delay(Duration::from_secs(self.delay_secs));
        for extra in &self.extra_patterns {
            let description = if extra.description.is_empty() {
                extra.pattern.as_str()
            } else {
                extra.description.as_str()
            };
            policy = policy.with_rule(&extra.pattern, description)?;
        }
        Ok(policy)
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> HarnessResult<RetryPolicy> {
        self.retry.policy()
    }
}
