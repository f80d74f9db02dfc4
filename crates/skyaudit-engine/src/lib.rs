//! Orchestration engine for skyaudit
//!
//! Resolves credentials, enumerates target accounts, expands the requested
//! accounts, regions, and checks into work items, runs them on a bounded
//! worker pool, and aggregates the outcomes into one ordered [`RunResult`].
//!
//! [`RunResult`]: skyaudit_core::RunResult

mod accounts;
mod aggregator;
mod credentials;
mod output;
mod runner;
mod scheduler;

pub use accounts::*;
pub use aggregator::*;
pub use credentials::*;
pub use output::*;
pub use runner::*;
pub use scheduler::*;
