//! Non-fatal assertions for validation checks
//!
//! A check records every unmet expectation and keeps going, so one run
//! reports all problems with a deployment instead of the first one.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Instant;

use crate::error::HarnessError;
use crate::outputs::Outputs;

/// Result of one named check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub assertions: usize,
    pub failures: Vec<String>,
    /// Live checks that could not run because no cloud inspector was configured
    pub skipped_live: bool,
    pub duration_ms: u64,
}

/// Collects assertion results for one check
#[derive(Debug)]
pub struct Assertions {
    check: String,
    assertions: usize,
    failures: Vec<String>,
    skipped_live: bool,
    /// Values of sensitive outputs read so far, masked in failure messages
    secrets: Vec<String>,
    started: Instant,
}

const REDACTED: &str = "***";

impl Assertions {
    pub fn new(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            assertions: 0,
            failures: Vec::new(),
            skipped_live: false,
            secrets: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn is_passing(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.assertions += 1;
        let message = self.redact(message.into());
        self.failures.push(message);
    }

    pub fn is_true(&mut self, condition: bool, message: impl Into<String>) -> bool {
        self.assertions += 1;
        if !condition {
            let message = self.redact(message.into());
            self.failures.push(message);
        }
        condition
    }

    fn redact(&self, mut message: String) -> String {
        for secret in &self.secrets {
            message = message.replace(secret.as_str(), REDACTED);
        }
        message
    }

    fn remember_secret(&mut self, outputs: &Outputs, name: &str, value: &str) {
        if !outputs.is_sensitive(name) || value.is_empty() {
            return;
        }
        if !self.secrets.iter().any(|s| s == value) {
            self.secrets.push(value.to_string());
        }
    }

    pub fn not_empty(&mut self, label: &str, value: &str) -> bool {
        self.is_true(!value.trim().is_empty(), format!("{} should not be empty", label))
    }

    pub fn contains(&mut self, label: &str, value: &str, needle: &str) -> bool {
        self.is_true(
            value.contains(needle),
            format!("{} should contain '{}', got '{}'", label, needle, value),
        )
    }

    pub fn starts_with(&mut self, label: &str, value: &str, prefix: &str) -> bool {
        self.is_true(
            value.starts_with(prefix),
            format!("{} should start with '{}', got '{}'", label, prefix, value),
        )
    }

    pub fn equals<T: PartialEq + Debug>(&mut self, label: &str, actual: &T, expected: &T) -> bool {
        self.is_true(
            actual == expected,
            format!("{} should be {:?}, got {:?}", label, expected, actual),
        )
    }

    /// Record an error (NotFound, Unauthorized, ...) as a failed assertion
    pub fn error(&mut self, label: &str, error: &HarnessError) {
        self.fail(format!("{}: {}", label, error));
    }

    /// A scalar output that must exist and be non-empty
    pub fn output<'o>(&mut self, outputs: &'o Outputs, name: &str) -> Option<&'o str> {
        match outputs.get(name) {
            Ok(value) => {
                self.remember_secret(outputs, name, value);
                if self.not_empty(name, value) {
                    Some(value)
                } else {
                    None
                }
            }
            Err(e) => {
                self.error(name, &e);
                None
            }
        }
    }

    /// A list output that must exist and be non-empty
    pub fn output_list<'o>(&mut self, outputs: &'o Outputs, name: &str) -> Option<&'o [String]> {
        match outputs.list(name) {
            Ok(items) => {
                for item in items {
                    self.remember_secret(outputs, name, item);
                }
                if self.is_true(!items.is_empty(), format!("{} should not be empty", name)) {
                    Some(items)
                } else {
                    None
                }
            }
            Err(e) => {
                self.error(name, &e);
                None
            }
        }
    }

    /// Output exists, is non-empty and contains `needle`
    pub fn output_contains(&mut self, outputs: &Outputs, name: &str, needle: &str) {
        if let Some(value) = self.output(outputs, name) {
            self.contains(name, value, needle);
        }
    }

    pub fn mark_live_skipped(&mut self) {
        self.skipped_live = true;
    }

    pub fn finish(self) -> CheckOutcome {
        CheckOutcome {
            passed: self.failures.is_empty(),
            name: self.check,
            assertions: self.assertions,
            failures: self.failures,
            skipped_live: self.skipped_live,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
