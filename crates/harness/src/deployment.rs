//! Scoped ownership of applied infrastructure
//!
//! A [`Deployment`] is armed the moment an apply is attempted. From then on it
//! destroys exactly once: either through [`Deployment::teardown`] or, on any
//! other exit path (early return, panic), when it is dropped.

use tracing::{error, info};

use crate::error::HarnessResult;
use crate::options::RunOptions;
use crate::outputs::Outputs;
use crate::terraform::Terraform;

pub struct Deployment {
    terraform: Terraform,
    options: RunOptions,
    armed: bool,
}

impl Deployment {
    pub fn new(terraform: Terraform, options: RunOptions) -> Self {
        Self {
            terraform,
            options,
            armed: false,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Whether a destroy is still owed
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// `init` + `apply`. A failed apply still leaves the deployment armed,
    /// since resources may have been partially created.
    pub fn apply(&mut self) -> HarnessResult<String> {
        self.armed = true;
        self.terraform.apply(&self.options)
    }

    /// Read every published output
    pub fn outputs(&self) -> HarnessResult<Outputs> {
        self.terraform.output_all(&self.options)
    }

    pub fn output(&self, name: &str) -> HarnessResult<String> {
        self.terraform.output(&self.options, name)
    }

    pub fn output_list(&self, name: &str) -> HarnessResult<Vec<String>> {
        self.terraform.output_list(&self.options, name)
    }

    /// Destroy now and report the result. A no-op if nothing was applied.
    pub fn teardown(mut self) -> HarnessResult<()> {
        self.destroy_once()
    }

    fn destroy_once(&mut self) -> HarnessResult<()> {
        if !self.armed {
            return Ok(());
        }
        // Disarm first so a failing destroy is not repeated from Drop.
        self.armed = false;
        self.terraform.destroy(&self.options).map(|_| ())
    }
}

impl Drop for Deployment {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        info!(
            "Deployment in {} dropped without teardown, destroying",
            self.options.terraform_dir().display()
        );
        if let Err(e) = self.destroy_once() {
            error!(
                "Destroy of {} failed, resources may be left behind: {}",
                self.options.terraform_dir().display(),
                e
            );
        }
    }
}
