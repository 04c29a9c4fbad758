//! Static checks on the layout of environment and module directories
//!
//! These run without terraform or cloud access. Every rule is evaluated, so a
//! report lists all findings for a directory at once.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::HarnessResult;

const ENVIRONMENT_FILES: &[&str] = &[
    "main.tf",
    "variables.tf",
    "outputs.tf",
    "versions.tf",
    "backend.tf",
    "terraform.tfvars",
];

const MODULE_FILES: &[&str] = &["main.tf", "variables.tf", "outputs.tf", "versions.tf", "README.md"];

/// (file, required fragment)
const ENVIRONMENT_CONTENT: &[(&str, &str)] = &[
    ("backend.tf", "backend \"azurerm\""),
    ("backend.tf", "resource_group_name"),
    ("versions.tf", "required_version"),
    ("versions.tf", "required_providers"),
    ("versions.tf", "azurerm"),
];

const MODULE_CONTENT: &[(&str, &str)] = &[
    ("outputs.tf", "output"),
    ("variables.tf", "variable"),
    ("versions.tf", "required_version"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Environment,
    Module,
}

/// One broken rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub message: String,
}

/// Lint result for one directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutReport {
    pub dir: PathBuf,
    pub kind: LayoutKind,
    pub findings: Vec<Finding>,
}

impl LayoutReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.dir.display().to_string())
    }

    fn missing(&mut self, file: &str) {
        self.findings.push(Finding {
            file: file.to_string(),
            message: "required file is missing".to_string(),
        });
    }

    fn finding(&mut self, file: &str, message: impl Into<String>) {
        self.findings.push(Finding {
            file: file.to_string(),
            message: message.into(),
        });
    }
}

/// Lint one environment directory
pub fn lint_environment(dir: &Path) -> HarnessResult<LayoutReport> {
    let mut report = lint(dir, LayoutKind::Environment, ENVIRONMENT_FILES, ENVIRONMENT_CONTENT)?;

    let tfvars = dir.join("terraform.tfvars");
    if tfvars.is_file() && std::fs::read_to_string(&tfvars)?.trim().is_empty() {
        report.finding("terraform.tfvars", "must not be empty");
    }
    Ok(report)
}

/// Lint one module directory
pub fn lint_module(dir: &Path) -> HarnessResult<LayoutReport> {
    lint(dir, LayoutKind::Module, MODULE_FILES, MODULE_CONTENT)
}

/// Lint every immediate subdirectory of `root` as `kind`, sorted by name
pub fn lint_tree(root: &Path, kind: LayoutKind) -> HarnessResult<Vec<LayoutReport>> {
    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.into_path())
        .collect();
    dirs.sort();

    dirs.iter()
        .map(|dir| match kind {
            LayoutKind::Environment => lint_environment(dir),
            LayoutKind::Module => lint_module(dir),
        })
        .collect()
}

fn lint(
    dir: &Path,
    kind: LayoutKind,
    files: &[&str],
    content: &[(&str, &str)],
) -> HarnessResult<LayoutReport> {
    debug!("Linting {:?} {}", kind, dir.display());
    let mut report = LayoutReport {
        dir: dir.to_path_buf(),
        kind,
        findings: Vec::new(),
    };

    for file in files {
        if !dir.join(file).is_file() {
            report.missing(file);
        }
    }

    for (file, fragment) in content {
        let path = dir.join(file);
        if !path.is_file() {
            continue;
        }
        if !std::fs::read_to_string(&path)?.contains(fragment) {
            report.finding(file, format!("should contain {}", fragment));
        }
    }

    Ok(report)
}
