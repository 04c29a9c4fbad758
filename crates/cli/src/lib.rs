//! tfprobe CLI
//!
//! Command-line interface for running verification scenarios, linting
//! configuration layouts and passing commands through to terraform.

pub mod commands;
pub mod output;
