//! CLI Commands

pub mod lint;
pub mod run;
pub mod tf;
