//! tfprobe CLI - Main Entry Point
//!
//! Runs Terraform verification scenarios against Azure, lints configuration
//! layouts and passes commands through to terraform.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tfprobe_cli::commands::{lint, run, tf};
use tfprobe_cli::output;
use tfprobe_harness::HarnessConfig;

/// tfprobe - Terraform deployment verification for Azure
#[derive(Parser)]
#[command(name = "tfprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file
    #[arg(long, default_value = "tfprobe.toml", env = "TFPROBE_CONFIG", global = true)]
    config: PathBuf,

    /// Terraform binary, overriding the configuration file
    #[arg(long, env = "TFPROBE_TERRAFORM_BIN", global = true)]
    terraform_bin: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run verification scenarios
    Run(run::RunArgs),

    /// Check environment and module directory layouts
    Lint(lint::LintArgs),

    /// Run a terraform command with harness credentials and retries
    Tf(tf::TfArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let mut config = HarnessConfig::load(&cli.config)?;
    if let Some(bin) = cli.terraform_bin {
        config.terraform_binary = bin;
    }

    match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await?,
        Commands::Lint(args) => lint::execute(args, cli.format)?,
        Commands::Tf(args) => tf::execute(args, config).await?,
        Commands::Version => {
            println!("tfprobe v{}", tfprobe_common::VERSION);
            match tf::terraform_version(&config).await {
                Ok(version) => println!("{}", version.trim()),
                Err(e) => output::print_warning(&format!("terraform not available: {}", e)),
            }
        }
    }

    Ok(())
}
