//! Terraform passthrough
//!
//! Runs terraform in a directory with the harness credentials in the
//! environment and the configured retry policy applied.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, warn};

use tfprobe_common::Credentials;
use tfprobe_harness::{HarnessConfig, RunOptions, Terraform};

#[derive(Args)]
pub struct TfArgs {
    /// Terraform configuration directory
    pub dir: PathBuf,

    /// Arguments passed to terraform, e.g. `validate` or `plan -lock=false`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub args: Vec<String>,

    /// Fail on the first error instead of retrying transient ones
    #[arg(long)]
    pub no_retry: bool,
}

pub async fn execute(args: TfArgs, config: HarnessConfig) -> Result<()> {
    let credentials = match Credentials::from_env() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("{}; terraform will use its own authentication", e);
            None
        }
    };

    let mut builder = RunOptions::builder(&args.dir)
        .terraform_binary(&config.terraform_binary)
        .credentials(credentials)
        .color(true);
    if args.no_retry {
        builder = builder.retry(tfprobe_harness::RetryPolicy::none());
    } else {
        builder = builder.retry(config.retry_policy()?);
    }
    let options = builder.build()?;

    debug!("terraform {} in {}", args.args.join(" "), args.dir.display());
    let stdout = tokio::task::spawn_blocking(move || {
        let argv: Vec<&str> = args.args.iter().map(String::as_str).collect();
        Terraform::new().run_command(&options, &argv)
    })
    .await
    .context("terraform task failed")??;

    print!("{}", stdout);
    Ok(())
}

/// `terraform version` with the configured binary
pub async fn terraform_version(config: &HarnessConfig) -> Result<String> {
    let options = RunOptions::builder(".")
        .terraform_binary(&config.terraform_binary)
        .retry(tfprobe_harness::RetryPolicy::none())
        .build()?;
    let version = tokio::task::spawn_blocking(move || Terraform::new().version(&options))
        .await
        .context("terraform task failed")??;
    Ok(version)
}
