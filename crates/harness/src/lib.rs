//! tfprobe verification harness
//!
//! Provisions Terraform configurations against a real Azure subscription,
//! checks the published outputs and the live resource state, and always
//! tears the infrastructure down again.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                        │
//! │  (YAML scenarios, bounded parallelism, JSON results)      │
//! └───────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌─────────────────────┐          ┌──────────────────────────┐
//! │ Deployment guard    │          │ Validators               │
//! │ apply ... destroy   │          │ outputs + CloudInspector │
//! └─────────────────────┘          └──────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌─────────────────────┐          ┌──────────────────────────┐
//! │ Terraform driver    │          │ ArmClient (ARM REST)     │
//! │ retry, outputs      │          │                          │
//! └─────────────────────┘          └──────────────────────────┘
//! ```

pub mod assertions;
pub mod azure;
pub mod config;
pub mod deployment;
pub mod error;
pub mod executor;
pub mod layout;
pub mod options;
pub mod outputs;
pub mod runner;
pub mod scenario;
pub mod terraform;
pub mod validators;

pub use assertions::{Assertions, CheckOutcome};
pub use azure::{ArmClient, ArmConfig, CloudInspector, ResourceRequest};
pub use config::HarnessConfig;
pub use deployment::Deployment;
pub use error::{HarnessError, HarnessResult};
pub use executor::{CommandExecutor, CommandOutput, CommandSpec, SystemExecutor};
pub use options::{RetryPolicy, RunOptions, RunOptionsBuilder};
pub use outputs::Outputs;
pub use runner::{Phase, RunnerConfig, ScenarioResult, ScenarioRunner, SuiteResult, Verdict};
pub use scenario::{Scenario, ScenarioMode, ScenarioSpec};
pub use terraform::Terraform;
pub use validators::{CheckSpec, ValidationContext, Validator};
