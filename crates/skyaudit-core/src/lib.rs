//! Skyaudit Core
//!
//! Core types, traits, and error handling for the skyaudit cloud resource auditor.

pub mod config;
pub mod error;
pub mod exclusion;
pub mod report;
pub mod resources;
pub mod traits;

pub use config::*;
pub use error::{AuditError, FailureKind, Result};
pub use exclusion::*;
pub use report::*;
pub use resources::*;
pub use traits::*;
