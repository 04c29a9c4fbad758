//! Terraform lifecycle driver
//!
//! All commands are blocking; `apply` and `destroy` can take tens of minutes
//! against a real subscription. Callers on an async runtime should go through
//! `spawn_blocking`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::executor::{CommandExecutor, CommandOutput, CommandSpec, SystemExecutor};
use crate::options::RunOptions;

/// `plan -detailed-exitcode` result when there is nothing to change
pub const PLAN_NO_CHANGES: i32 = 0;

/// `plan -detailed-exitcode` result when the plan has changes
pub const PLAN_HAS_CHANGES: i32 = 2;

/// Drives the terraform CLI through a [`CommandExecutor`]
#[derive(Clone)]
pub struct Terraform {
    executor: Arc<dyn CommandExecutor>,
}

impl Default for Terraform {
    fn default() -> Self {
        Self::new()
    }
}

impl Terraform {
    /// Driver running the real terraform binary
    pub fn new() -> Self {
        Self::with_executor(Arc::new(SystemExecutor))
    }

    pub fn with_executor(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// `terraform init`
    pub fn init(&self, opts: &RunOptions) -> HarnessResult<String> {
        let mut args = vec![
            "init".to_string(),
            "-upgrade=false".to_string(),
            "-input=false".to_string(),
        ];
        if !opts.backend() {
            args.push("-backend=false".to_string());
        }
        push_no_color(&mut args, opts);
        Ok(self.run_with_retry(opts, args, &[0])?.stdout)
    }

    /// `terraform init` followed by `terraform apply -auto-approve`
    pub fn apply(&self, opts: &RunOptions) -> HarnessResult<String> {
        self.init(opts)?;

        info!("Applying {}", opts.terraform_dir().display());
        let mut args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        push_no_color(&mut args, opts);
        args.extend(opts.var_args());
        Ok(self.run_with_retry(opts, args, &[0])?.stdout)
    }

    /// `terraform destroy -auto-approve`
    pub fn destroy(&self, opts: &RunOptions) -> HarnessResult<String> {
        info!("Destroying {}", opts.terraform_dir().display());
        let mut args = vec![
            "destroy".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        push_no_color(&mut args, opts);
        args.extend(opts.var_args());
        Ok(self.run_with_retry(opts, args, &[0])?.stdout)
    }

    /// `terraform validate`
    pub fn validate(&self, opts: &RunOptions) -> HarnessResult<String> {
        let mut args = vec!["validate".to_string()];
        push_no_color(&mut args, opts);
        Ok(self.run_with_retry(opts, args, &[0])?.stdout)
    }

    /// `terraform plan -detailed-exitcode`, returning 0 (no changes) or 2 (changes)
    pub fn plan_exit_code(&self, opts: &RunOptions) -> HarnessResult<i32> {
        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            "-lock=false".to_string(),
            "-detailed-exitcode".to_string(),
        ];
        push_no_color(&mut args, opts);
        args.extend(opts.var_args());
        let output = self.run_with_retry(opts, args, &[PLAN_NO_CHANGES, PLAN_HAS_CHANGES])?;
        Ok(output.exit_code)
    }

    /// `terraform version`
    pub fn version(&self, opts: &RunOptions) -> HarnessResult<String> {
        self.run_command(opts, &["version"])
    }

    /// Run an arbitrary terraform command with the retry policy applied
    pub fn run_command(&self, opts: &RunOptions, args: &[&str]) -> HarnessResult<String> {
        let args = args.iter().map(|s| s.to_string()).collect();
        Ok(self.run_with_retry(opts, args, &[0])?.stdout)
    }

    /// Run once without retries, failing on any exit code outside `accept`
    pub(crate) fn run_once(
        &self,
        opts: &RunOptions,
        args: Vec<String>,
        accept: &[i32],
    ) -> HarnessResult<CommandOutput> {
        let spec = self.spec(opts, args);
        let output = self.executor.execute(&spec)?;
        if accept.contains(&output.exit_code) {
            return Ok(output);
        }
        Err(HarnessError::FatalProvisioning {
            command: spec.subcommand().to_string(),
            exit_code: output.exit_code,
            output: output.combined(),
        })
    }

    fn run_with_retry(
        &self,
        opts: &RunOptions,
        args: Vec<String>,
        accept: &[i32],
    ) -> HarnessResult<CommandOutput> {
        let spec = self.spec(opts, args);
        let policy = opts.retry();
        let command = spec.subcommand().to_string();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!("terraform {} attempt {}", command, attempt);
            let output = self.executor.execute(&spec)?;
            if accept.contains(&output.exit_code) {
                return Ok(output);
            }

            let combined = output.combined();
            let Some(rule) = policy.matching(&combined) else {
                return Err(HarnessError::FatalProvisioning {
                    command,
                    exit_code: output.exit_code,
                    output: combined,
                });
            };

            if attempt > policy.max_retries() {
                return Err(HarnessError::TransientProvisioning {
                    command,
                    attempts: attempt,
                    description: rule.description.clone(),
                    output: combined,
                });
            }

            warn!(
                "terraform {} failed with a retryable error ({}); retrying in {:?} ({}/{})",
                command,
                rule.description,
                policy.delay(),
                attempt,
                policy.max_retries()
            );
            std::thread::sleep(policy.delay());
        }
    }

    fn spec(&self, opts: &RunOptions, args: Vec<String>) -> CommandSpec {
        CommandSpec {
            program: opts.terraform_binary().to_path_buf(),
            args,
            working_dir: opts.terraform_dir().to_path_buf(),
            env: opts.process_env(),
        }
    }
}

fn push_no_color(args: &mut Vec<String>, opts: &RunOptions) {
    if opts.no_color() {
        args.push("-no-color".to_string());
    }
}
