//! tfprobe Common Library
//!
//! Shared domain types for driving and verifying Terraform deployments on Azure.

pub mod error;
pub mod naming;
pub mod resource_id;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use naming::unique_id;
pub use resource_id::ResourceId;
pub use types::*;

/// tfprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
