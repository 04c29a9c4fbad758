//! Error types for the verification harness

use std::path::PathBuf;
use thiserror::Error;

use tfprobe_common::ResourceKind;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("terraform {command} hit a transient error after {attempts} attempt(s) ({description})\n{output}")]
    TransientProvisioning {
        command: String,
        attempts: u32,
        description: String,
        output: String,
    },

    #[error("terraform {command} failed with exit code {exit_code}\n{output}")]
    FatalProvisioning {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("Output not found: {0}")]
    OutputNotFound(String),

    #[error("Output {name} is a {actual}, expected a {expected}")]
    OutputType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Resource not found: {kind} {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("Unauthorized to read {kind} {name}: {message}")]
    Unauthorized {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("ARM request failed with status {status}: {body}")]
    ArmStatus { status: u16, body: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Scenario spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Common(#[from] tfprobe_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl HarnessError {
    /// Whether the error means a queried output or resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HarnessError::OutputNotFound(_) | HarnessError::NotFound { .. }
        )
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
