//! Scenario run command

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use tfprobe_common::Credentials;
use tfprobe_harness::{
    ArmClient, HarnessConfig, RunnerConfig, Scenario, ScenarioResult, ScenarioRunner, ScenarioSpec,
};

use crate::output::{print_document, print_error, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file, or directory searched recursively for *.yaml
    pub specs: PathBuf,

    /// Only run scenarios carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only run the scenario with this name
    #[arg(long)]
    pub name: Option<String>,

    /// Scenarios to run at once
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Directory for the JSON results
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Skip live checks against Azure Resource Manager
    #[arg(long)]
    pub no_live: bool,
}

/// Scenario summary for display
#[derive(Serialize)]
struct ScenarioRow {
    name: String,
    verdict: String,
    checks: String,
    suffix: String,
    duration_ms: u64,
}

impl From<&ScenarioResult> for ScenarioRow {
    fn from(result: &ScenarioResult) -> Self {
        let passed = result.checks.iter().filter(|c| c.passed).count();
        Self {
            name: result.name.clone(),
            verdict: if result.passed() { "passed" } else { "failed" }.to_string(),
            checks: format!("{}/{}", passed, result.checks.len()),
            suffix: result.random_suffix.clone().unwrap_or_else(|| "-".to_string()),
            duration_ms: result.duration_ms,
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Verdict", "Checks", "Suffix", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.verdict.clone(),
            self.checks.clone(),
            self.suffix.clone(),
            format!("{:.1}s", self.duration_ms as f64 / 1000.0),
        ]
    }
}

/// Pick scenarios by tag and name
fn select(specs: Vec<ScenarioSpec>, tag: Option<&str>, name: Option<&str>) -> Vec<ScenarioSpec> {
    specs
        .into_iter()
        .filter(|s| tag.map_or(true, |t| s.tags.iter().any(|x| x == t)))
        .filter(|s| name.map_or(true, |n| s.name == n))
        .collect()
}

pub async fn execute(args: RunArgs, config: HarnessConfig, format: OutputFormat) -> Result<()> {
    let specs = select(
        ScenarioSpec::load(&args.specs)?,
        args.tag.as_deref(),
        args.name.as_deref(),
    );
    if specs.is_empty() {
        bail!("no scenarios matched in {}", args.specs.display());
    }

    let credentials = match Credentials::from_env() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("{}; terraform will use its own authentication and live checks are skipped", e);
            None
        }
    };

    let mut runner_config = RunnerConfig::from_config(&config)?;
    if let Some(parallel) = args.parallel {
        runner_config.parallelism = parallel.max(1);
    }
    if let Some(output) = args.output {
        runner_config.results_dir = output;
    }

    let mut runner = ScenarioRunner::new(runner_config).with_credentials(credentials.clone());
    match credentials {
        Some(credentials) if !args.no_live => {
            runner = runner.with_inspector(Arc::new(ArmClient::new(credentials, config.arm.clone())?));
        }
        _ => info!("Live checks disabled"),
    }

    let scenarios: Vec<Scenario> = specs.into_iter().map(Scenario::from_spec).collect();
    let suite = runner.run_all(scenarios).await;
    runner.write_results(&suite)?;

    if format.is_human() {
        let rows: Vec<ScenarioRow> = suite.results.iter().map(ScenarioRow::from).collect();
        print_list(&rows, format);
        for result in suite.results.iter().filter(|r| !r.passed()) {
            for failure in result.failures() {
                print_error(&format!("{}: {}", result.name, failure));
            }
        }
        if suite.success() {
            print_success(&format!("{} scenario(s) passed", suite.passed));
        }
    } else {
        print_document(&suite, format, "");
    }

    if !suite.success() {
        bail!("{} of {} scenario(s) failed", suite.failed, suite.total);
    }
    Ok(())
}
