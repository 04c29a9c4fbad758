//! Layout lint command

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use tfprobe_harness::layout::{lint_tree, LayoutKind, LayoutReport};

use crate::output::{print_document, print_error, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct LintArgs {
    /// Directory whose subdirectories are environments
    #[arg(long)]
    pub environments: Option<PathBuf>,

    /// Directory whose subdirectories are modules
    #[arg(long)]
    pub modules: Option<PathBuf>,
}

#[derive(Serialize)]
struct LintRow {
    directory: String,
    kind: String,
    findings: usize,
}

impl From<&LayoutReport> for LintRow {
    fn from(report: &LayoutReport) -> Self {
        Self {
            directory: report.name(),
            kind: match report.kind {
                LayoutKind::Environment => "environment".to_string(),
                LayoutKind::Module => "module".to_string(),
            },
            findings: report.findings.len(),
        }
    }
}

impl TableDisplay for LintRow {
    fn headers() -> Vec<&'static str> {
        vec!["Directory", "Kind", "Findings"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.directory.clone(),
            self.kind.clone(),
            if self.findings == 0 {
                "ok".to_string()
            } else {
                self.findings.to_string()
            },
        ]
    }
}

pub fn execute(args: LintArgs, format: OutputFormat) -> Result<()> {
    if args.environments.is_none() && args.modules.is_none() {
        bail!("nothing to lint: pass --environments and/or --modules");
    }

    let mut reports = Vec::new();
    if let Some(dir) = &args.environments {
        reports.extend(lint_tree(dir, LayoutKind::Environment)?);
    }
    if let Some(dir) = &args.modules {
        reports.extend(lint_tree(dir, LayoutKind::Module)?);
    }

    let dirty: Vec<&LayoutReport> = reports.iter().filter(|r| !r.is_clean()).collect();

    if format.is_human() {
        let rows: Vec<LintRow> = reports.iter().map(LintRow::from).collect();
        print_list(&rows, format);
        for report in &dirty {
            for finding in &report.findings {
                print_error(&format!("{}/{}: {}", report.name(), finding.file, finding.message));
            }
        }
        if dirty.is_empty() {
            print_success(&format!("{} director(ies) clean", reports.len()));
        }
    } else {
        print_document(&reports, format, "");
    }

    if !dirty.is_empty() {
        bail!("{} of {} director(ies) have layout findings", dirty.len(), reports.len());
    }
    Ok(())
}
