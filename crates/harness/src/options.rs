//! Run options for a terraform invocation
//!
//! [`RunOptions`] is immutable once built and owned by a single scenario.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tfprobe_common::{Credentials, DeploymentVariables, VariableValue};

use crate::error::{HarnessError, HarnessResult};

/// Default number of retries after the first failed attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Transient provisioning errors worth retrying, with a human description
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (r"read: connection reset by peer", "Failed to reach a remote repository."),
    (r"transport is closing", "Failed to reach the Kubernetes API."),
    (r"unable to verify signature", "Failed to retrieve plugin due to transient network error."),
    (r"unable to verify checksum", "Failed to retrieve plugin due to transient network error."),
    (r"no provider exists with the given name", "Failed to retrieve plugin due to transient network error."),
    (r"registry service is unreachable", "Failed to retrieve plugin due to transient network error."),
    (r"Error installing provider", "Failed to retrieve plugin due to transient network error."),
    (r"Failed to query available provider packages", "Failed to retrieve plugin due to transient network error."),
    (r"timeout while waiting for plugin to start", "Failed to retrieve plugin due to transient network error."),
    (r"timed out waiting for server handshake", "Failed to retrieve plugin due to transient network error."),
    (r"could not query provider registry for", "Failed to retrieve plugin due to transient network error."),
    (r"Provider produced inconsistent result after apply", "Provider eventual consistency error."),
    (r"(?i)429 Too Many Requests|TooManyRequests", "Azure Resource Manager throttled the request."),
    (r"AnotherOperationInProgress", "Azure is still processing a conflicting operation."),
    (r"RetryableError", "Azure reported a retryable error."),
];

/// A compiled retry pattern
#[derive(Debug, Clone)]
pub struct RetryRule {
    pub pattern: Regex,
    pub description: String,
}

/// Which failures to retry, how often and how far apart
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    rules: Vec<RetryRule>,
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            rules: Vec::new(),
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// The default transient-error policy
    pub fn transient_defaults() -> Self {
        let rules = DEFAULT_RETRYABLE_ERRORS
            .iter()
            .filter_map(|(pattern, description)| {
                Regex::new(pattern).ok().map(|pattern| RetryRule {
                    pattern,
                    description: description.to_string(),
                })
            })
            .collect();
        Self {
            rules,
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_rule(mut self, pattern: &str, description: &str) -> HarnessResult<Self> {
        self.rules.push(RetryRule {
            pattern: Regex::new(pattern)?,
            description: description.to_string(),
        });
        Ok(self)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The first rule whose pattern occurs in `output`
    pub fn matching(&self, output: &str) -> Option<&RetryRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(output))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn rules(&self) -> &[RetryRule] {
        &self.rules
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::transient_defaults()
    }
}

/// Everything the driver needs to run terraform against one directory
#[derive(Debug, Clone)]
pub struct RunOptions {
    terraform_dir: PathBuf,
    terraform_binary: PathBuf,
    variables: DeploymentVariables,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
    no_color: bool,
    backend: bool,
    env: BTreeMap<String, String>,
}

impl RunOptions {
    pub fn builder(terraform_dir: impl Into<PathBuf>) -> RunOptionsBuilder {
        RunOptionsBuilder::new(terraform_dir)
    }

    pub fn terraform_dir(&self) -> &Path {
        &self.terraform_dir
    }

    pub fn terraform_binary(&self) -> &Path {
        &self.terraform_binary
    }

    pub fn variables(&self) -> &DeploymentVariables {
        &self.variables
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn no_color(&self) -> bool {
        self.no_color
    }

    /// Whether `init` configures the backend (`-backend=false` otherwise)
    pub fn backend(&self) -> bool {
        self.backend
    }

    /// `-var name=value` argument pairs
    pub fn var_args(&self) -> Vec<String> {
        self.variables
            .to_pairs()
            .into_iter()
            .flat_map(|(name, value): (String, VariableValue)| {
                ["-var".to_string(), format!("{}={}", name, value.render())]
            })
            .collect()
    }

    /// Environment for the terraform process: extra env, then credentials
    pub fn process_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = vec![("TF_IN_AUTOMATION".into(), "1".into())];
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(creds) = &self.credentials {
            env.extend(creds.env_pairs().into_iter().map(|(k, v)| (k.to_string(), v)));
        }
        env
    }
}

/// Builder for [`RunOptions`]
#[derive(Debug, Clone)]
pub struct RunOptionsBuilder {
    terraform_dir: PathBuf,
    terraform_binary: PathBuf,
    variables: DeploymentVariables,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
    no_color: bool,
    backend: bool,
    env: BTreeMap<String, String>,
}

impl RunOptionsBuilder {
    pub fn new(terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            terraform_dir: terraform_dir.into(),
            terraform_binary: PathBuf::from("terraform"),
            variables: DeploymentVariables::default(),
            credentials: None,
            retry: RetryPolicy::transient_defaults(),
            no_color: true,
            backend: true,
            env: BTreeMap::new(),
        }
    }

    pub fn variables(mut self, variables: DeploymentVariables) -> Self {
        self.variables = variables;
        self
    }

    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn terraform_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.terraform_binary = binary.into();
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn color(mut self, enabled: bool) -> Self {
        self.no_color = !enabled;
        self
    }

    pub fn backend(mut self, enabled: bool) -> Self {
        self.backend = enabled;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> HarnessResult<RunOptions> {
        if self.terraform_dir.as_os_str().is_empty() {
            return Err(HarnessError::InvalidConfig(
                "terraform directory must not be empty".to_string(),
            ));
        }
        if self.terraform_binary.as_os_str().is_empty() {
            return Err(HarnessError::InvalidConfig(
                "terraform binary must not be empty".to_string(),
            ));
        }
        self.variables.validate()?;

        Ok(RunOptions {
            terraform_dir: self.terraform_dir,
            terraform_binary: self.terraform_binary,
            variables: self.variables,
            credentials: self.credentials,
            retry: self.retry,
            no_color: self.no_color,
            backend: self.backend,
            env: self.env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let opts = RunOptions::builder("../environments/dev").build().unwrap();
        assert!(opts.no_color());
        assert!(opts.backend());
        assert_eq!(opts.retry().max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(opts.retry().delay(), DEFAULT_RETRY_DELAY);
        assert_eq!(opts.retry().rules().len(), DEFAULT_RETRYABLE_ERRORS.len());
        assert_eq!(opts.terraform_binary(), Path::new("terraform"));
    }

    #[test_case("Error: Failed to query available provider packages" ; "provider registry")]
    #[test_case("Error: Provider produced inconsistent result after apply" ; "eventual consistency")]
    #[test_case("Status=429 Code=\"TooManyRequests\"" ; "throttling")]
    #[test_case("Code=\"AnotherOperationInProgress\"" ; "conflicting operation")]
    fn test_default_policy_matches_transient_errors(output: &str) {
        assert!(RetryPolicy::transient_defaults().matching(output).is_some());
    }

    #[test]
    fn test_default_policy_ignores_config_errors() {
        let policy = RetryPolicy::transient_defaults();
        assert!(policy
            .matching("Error: Reference to undeclared input variable")
            .is_none());
    }

    #[test]
    fn test_custom_rule_and_invalid_regex() {
        let policy = RetryPolicy::none()
            .with_rule("SubnetIsInUse", "subnet still attached")
            .unwrap();
        assert_eq!(
            policy.matching("Code=SubnetIsInUse").unwrap().description,
            "subnet still attached"
        );
        assert!(RetryPolicy::none().with_rule("(unclosed", "bad").is_err());
    }

    #[test]
    fn test_var_args_and_env() {
        let creds = Credentials {
            client_id: "c".into(),
            client_secret: "s".into(),
            tenant_id: "t".into(),
            subscription_id: "sub".into(),
        };
        let opts = RunOptions::builder("dir")
            .variables(DeploymentVariables {
                prefix: Some("test".into()),
                location: Some("eastus".into()),
                ..Default::default()
            })
            .credentials(Some(creds))
            .env("TF_LOG", "WARN")
            .build()
            .unwrap();

        assert_eq!(
            opts.var_args(),
            vec!["-var", "location=eastus", "-var", "prefix=test"]
        );
        let env = opts.process_env();
        assert!(env.contains(&("ARM_SUBSCRIPTION_ID".to_string(), "sub".to_string())));
        assert!(env.contains(&("TF_LOG".to_string(), "WARN".to_string())));
    }

    #[test]
    fn test_build_rejects_invalid_variables() {
        let result = RunOptions::builder("dir")
            .variables(DeploymentVariables {
                prefix: Some("UPPER".into()),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(HarnessError::Common(_))));
    }

    #[test]
    fn test_build_rejects_empty_dir() {
        assert!(RunOptions::builder("").build().is_err());
    }
}
