//! Scenario orchestrator
//!
//! ```text
//! deploy:  Init ──apply──▶ Applied ──▶ Validating ──▶ Destroyed
//!            └───────── apply failed ──────────────────▲
//! plan:    Init ──init/validate/plan──▶ Planned
//! ```
//!
//! Destroy runs exactly once whenever an apply was attempted, whatever the
//! checks report. Checks of one scenario run concurrently over the same
//! outputs; scenarios run as separate tasks bounded by a semaphore.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tfprobe_common::{unique_id, Credentials};

use crate::assertions::{Assertions, CheckOutcome};
use crate::azure::CloudInspector;
use crate::config::HarnessConfig;
use crate::deployment::Deployment;
use crate::error::{HarnessError, HarnessResult};
use crate::options::{RetryPolicy, RunOptions};
use crate::outputs::Outputs;
use crate::scenario::{Scenario, ScenarioMode, ScenarioSpec};
use crate::terraform::Terraform;
use crate::validators::{ValidationContext, Validator};

/// Lifecycle phases a scenario passed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Applied,
    Validating,
    Destroyed,
    Planned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub mode: ScenarioMode,
    pub verdict: Verdict,
    pub phases: Vec<Phase>,
    /// Suffix injected for this run, if any
    pub random_suffix: Option<String>,
    pub checks: Vec<CheckOutcome>,
    pub plan_exit_code: Option<i32>,
    /// Provisioning or setup failure
    pub error: Option<String>,
    pub destroy_error: Option<String>,
    pub duration_ms: u64,
}

impl ScenarioResult {
    fn new(name: &str, mode: ScenarioMode) -> Self {
        Self {
            name: name.to_string(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            mode,
            verdict: Verdict::Failed,
            phases: vec![Phase::Init],
            random_suffix: None,
            checks: Vec::new(),
            plan_exit_code: None,
            error: None,
            destroy_error: None,
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    /// Every failure message: setup, checks, then destroy
    pub fn failures(&self) -> Vec<String> {
        let mut out: Vec<String> = self.error.iter().cloned().collect();
        for check in &self.checks {
            out.extend(check.failures.iter().map(|f| format!("[{}] {}", check.name, f)));
        }
        if let Some(e) = &self.destroy_error {
            out.push(format!("destroy: {}", e));
        }
        out
    }

    fn finish(mut self, started: Instant) -> Self {
        let checks_ok = self.checks.iter().all(|c| c.passed);
        self.verdict = if self.error.is_none() && self.destroy_error.is_none() && checks_ok {
            Verdict::Passed
        } else {
            Verdict::Failed
        };
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub terraform_binary: PathBuf,
    pub parallelism: usize,
    pub results_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            terraform_binary: PathBuf::from("terraform"),
            parallelism: 2,
            results_dir: PathBuf::from("test-results"),
            retry: RetryPolicy::transient_defaults(),
        }
    }
}

impl RunnerConfig {
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        Ok(Self {
            terraform_binary: config.terraform_binary.clone(),
            parallelism: config.parallelism.max(1),
            results_dir: config.results_dir.clone(),
            retry: config.retry_policy()?,
        })
    }
}

/// Runs scenarios end to end
#[derive(Clone)]
pub struct ScenarioRunner {
    terraform: Terraform,
    inspector: Option<Arc<dyn CloudInspector>>,
    credentials: Option<Credentials>,
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            terraform: Terraform::new(),
            inspector: None,
            credentials: None,
            config,
        }
    }

    pub fn with_terraform(mut self, terraform: Terraform) -> Self {
        self.terraform = terraform;
        self
    }

    /// Enable live checks
    pub fn with_inspector(mut self, inspector: Arc<dyn CloudInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Credentials passed to terraform as `ARM_*`
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Build the run options for one execution of `spec`
    pub fn options_for(&self, spec: &ScenarioSpec) -> HarnessResult<RunOptions> {
        let mut variables = spec.variables.clone();
        if spec.unique_suffix {
            variables.random_suffix = Some(unique_id());
        }

        RunOptions::builder(&spec.terraform_dir)
            .variables(variables)
            .credentials(self.credentials.clone())
            .terraform_binary(&self.config.terraform_binary)
            .retry(spec.retry.apply(self.config.retry.clone()))
            .backend(spec.backend)
            .build()
    }

    /// Run one scenario to a verdict. Never fails: every error lands in the result.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let started = Instant::now();
        let mut result = ScenarioResult::new(scenario.name(), scenario.spec.mode);
        info!("▶ {} ({})", scenario.name(), result.run_id);

        let options = match self.options_for(&scenario.spec) {
            Ok(options) => options,
            Err(e) => {
                error!("{}: invalid options: {}", scenario.name(), e);
                result.error = Some(e.to_string());
                return result.finish(started);
            }
        };
        result.random_suffix = options.variables().random_suffix.clone();

        match scenario.spec.mode {
            ScenarioMode::Deploy => self.deploy(scenario, options, &mut result).await,
            ScenarioMode::Plan => self.plan(scenario, options, &mut result).await,
        }

        let result = result.finish(started);
        if result.passed() {
            info!("✓ {} ({} ms)", result.name, result.duration_ms);
        } else {
            error!("✗ {} - {} failure(s)", result.name, result.failures().len());
        }
        result
    }

    async fn deploy(&self, scenario: &Scenario, options: RunOptions, result: &mut ScenarioResult) {
        let mut deployment = Deployment::new(self.terraform.clone(), options);

        // A panic inside the task drops the deployment there, which destroys.
        let applied = tokio::task::spawn_blocking(move || {
            let outputs = deployment.apply().map(|_| deployment.outputs());
            (deployment, outputs)
        })
        .await;

        let (deployment, outcome) = match applied {
            Ok(pair) => pair,
            Err(e) => {
                result.error = Some(format!("apply task failed: {}", e));
                result.phases.push(Phase::Destroyed);
                return;
            }
        };

        match outcome {
            Ok(outputs) => {
                result.phases.push(Phase::Applied);
                match outputs {
                    Ok(outputs) => {
                        info!("{}: applied, {} output(s)", scenario.name(), outputs.len());
                        result.phases.push(Phase::Validating);
                        result.checks = self.run_checks(&scenario.validators, &outputs).await;
                    }
                    Err(e) => {
                        error!("{}: reading outputs failed: {}", scenario.name(), e);
                        result.error = Some(e.to_string());
                    }
                }
            }
            Err(e) => {
                error!("{}: apply failed: {}", scenario.name(), e);
                result.error = Some(e.to_string());
            }
        }

        info!("{}: destroying", scenario.name());
        match tokio::task::spawn_blocking(move || deployment.teardown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("{}: destroy failed: {}", scenario.name(), e);
                result.destroy_error = Some(e.to_string());
            }
            Err(e) => result.destroy_error = Some(format!("destroy task failed: {}", e)),
        }
        result.phases.push(Phase::Destroyed);
    }

    async fn plan(&self, scenario: &Scenario, options: RunOptions, result: &mut ScenarioResult) {
        let terraform = self.terraform.clone();
        let planned = tokio::task::spawn_blocking(move || -> HarnessResult<i32> {
            terraform.init(&options)?;
            terraform.validate(&options)?;
            terraform.plan_exit_code(&options)
        })
        .await
        .map_err(|e| HarnessError::Task(e.to_string()))
        .and_then(|r| r);

        match planned {
            Ok(code) => {
                result.phases.push(Phase::Planned);
                result.plan_exit_code = Some(code);
                let expected = scenario.spec.expected_plan_exit_code;
                if code != expected {
                    result.error = Some(
                        HarnessError::AssertionFailed(format!(
                            "plan exit code should be {}, got {}",
                            expected, code
                        ))
                        .to_string(),
                    );
                }
            }
            Err(e) => result.error = Some(e.to_string()),
        }
    }

    /// Run every check concurrently; one failing or panicking check never stops the others
    pub async fn run_checks(
        &self,
        validators: &[Arc<dyn Validator>],
        outputs: &Outputs,
    ) -> Vec<CheckOutcome> {
        let inspector = self.inspector.as_deref();
        join_all(
            validators
                .iter()
                .map(|v| run_check(v.as_ref(), outputs, inspector)),
        )
        .await
    }

    /// Run scenarios with bounded parallelism; results keep the input order
    pub async fn run_all(&self, scenarios: Vec<Scenario>) -> SuiteResult {
        let start = Instant::now();
        let total = scenarios.len();
        let names: Vec<(String, ScenarioMode)> = scenarios
            .iter()
            .map(|s| (s.name().to_string(), s.spec.mode))
            .collect();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        info!(
            "Running {} scenario(s), {} at a time...",
            total,
            self.config.parallelism.max(1)
        );

        let mut tasks = JoinSet::new();
        for (index, scenario) in scenarios.into_iter().enumerate() {
            let runner = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, runner.run_scenario(&scenario).await)
            });
        }

        let mut slots: Vec<Option<ScenarioResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Scenario task failed: {}", e),
            }
        }

        let results: Vec<ScenarioResult> = slots
            .into_iter()
            .zip(names)
            .map(|(slot, (name, mode))| {
                slot.unwrap_or_else(|| {
                    let mut lost = ScenarioResult::new(&name, mode);
                    lost.error = Some("scenario task did not complete".to_string());
                    lost
                })
            })
            .collect();

        let passed = results.iter().filter(|r| r.passed()).count();
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed,
            total - passed,
            duration_ms
        );

        SuiteResult {
            total,
            passed,
            failed: total - passed,
            duration_ms,
            results,
        }
    }

    /// Write suite results to `<results_dir>/tfprobe-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.config.results_dir)?;

        let path = self.config.results_dir.join("tfprobe-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn run_check(
    validator: &dyn Validator,
    outputs: &Outputs,
    inspector: Option<&dyn CloudInspector>,
) -> CheckOutcome {
    let mut assertions = Assertions::new(validator.name());
    let ctx = ValidationContext::new(outputs, inspector);
    debug!("Running check {}", validator.name());

    let outcome = AssertUnwindSafe(validator.validate(&ctx, &mut assertions))
        .catch_unwind()
        .await;
    if let Err(panic) = outcome {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        assertions.fail(format!("check panicked: {}", message));
    }

    let outcome = assertions.finish();
    if !outcome.passed {
        warn!("Check {} failed: {}", outcome.name, outcome.failures.join("; "));
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn spec(yaml: &str) -> ScenarioSpec {
        ScenarioSpec::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_unique_suffix_injected() {
        let runner = ScenarioRunner::new(RunnerConfig::default());
        let spec = spec("name: s\nterraform_dir: /tmp/env\nunique_suffix: true\nvariables:\n  prefix: test\n");

        let first = runner.options_for(&spec).unwrap();
        let second = runner.options_for(&spec).unwrap();
        let a = first.variables().random_suffix.clone().unwrap();
        let b = second.variables().random_suffix.clone().unwrap();
        assert_eq!(a.len(), 6);
        assert_ne!(a, b);
        assert!(first.var_args().contains(&format!("random_suffix={}", a)));
    }

    #[test]
    fn test_options_follow_spec() {
        let runner = ScenarioRunner::new(RunnerConfig {
            terraform_binary: PathBuf::from("/opt/terraform"),
            ..Default::default()
        });
        let spec = spec("name: s\nterraform_dir: /tmp/env\nbackend: false\nretry:\n  max_retries: 0\n");
        let options = runner.options_for(&spec).unwrap();
        assert!(!options.backend());
        assert_eq!(options.retry().max_retries(), 0);
        assert_eq!(options.terraform_binary(), Path::new("/opt/terraform"));
        assert!(options.variables().random_suffix.is_none());
    }

    #[test]
    fn test_verdict_aggregation() {
        let ok = CheckOutcome {
            name: "a".into(),
            passed: true,
            assertions: 1,
            failures: vec![],
            skipped_live: false,
            duration_ms: 0,
        };
        let mut result = ScenarioResult::new("s", ScenarioMode::Deploy);
        result.checks.push(ok.clone());
        assert!(result.finish(Instant::now()).passed());

        let mut result = ScenarioResult::new("s", ScenarioMode::Deploy);
        result.checks.push(ok);
        result.destroy_error = Some("boom".into());
        let result = result.finish(Instant::now());
        assert!(!result.passed());
        assert_eq!(result.failures(), vec!["destroy: boom".to_string()]);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScenarioRunner::new(RunnerConfig {
            results_dir: dir.path().join("out"),
            ..Default::default()
        });
        let suite = SuiteResult {
            total: 0,
            passed: 0,
            failed: 0,
            duration_ms: 1,
            results: vec![],
        };
        let path = runner.write_results(&suite).unwrap();
        let back: SuiteResult =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(back.success());
    }
}
