//! Cost and Security Checks for Skyaudit
//!
//! Each check lists one kind of resource through the session's
//! [`ResourceApi`](skyaudit_core::ResourceApi), drops excluded resources
//! before any per-resource metric call, and applies a threshold predicate.
//!
//! # Example
//!
//! ```no_run
//! use skyaudit_checks::default_registry;
//!
//! let registry = default_registry();
//! for check in registry.checks() {
//!     println!("{}: {}", check.id(), check.description());
//! }
//! ```

pub mod services;

#[cfg(test)]
pub(crate) mod testing;

use serde::Serialize;
use skyaudit_core::{AuditCheck, AuditError, CheckKind, Result, Severity};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Static description of a check
#[derive(Debug, Clone, Copy)]
pub struct CheckDefinition {
    pub id: &'static str,
    pub service: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub kind: CheckKind,
    pub severity: Severity,
    /// Queried once per account instead of once per region
    pub global: bool,
    pub remediation: &'static str,
}

/// Implement [`AuditCheck`] for a type with a `DEFINITION` constant and a
/// `run` method
macro_rules! audit_check {
    ($ty:ty) => {
        impl skyaudit_core::AuditCheck for $ty {
            fn id(&self) -> &str {
                Self::DEFINITION.id
            }

            fn service(&self) -> &str {
                Self::DEFINITION.service
            }

            fn name(&self) -> &str {
                Self::DEFINITION.name
            }

            fn description(&self) -> &str {
                Self::DEFINITION.description
            }

            fn kind(&self) -> skyaudit_core::CheckKind {
                Self::DEFINITION.kind
            }

            fn severity(&self) -> skyaudit_core::Severity {
                Self::DEFINITION.severity
            }

            fn is_global(&self) -> bool {
                Self::DEFINITION.global
            }

            fn execute(
                &self,
                session: &skyaudit_core::Session,
                ctx: &skyaudit_core::ExecutionContext,
            ) -> skyaudit_core::Result<Vec<skyaudit_core::Finding>> {
                self.run(session, ctx)
            }
        }
    };
}
pub(crate) use audit_check;

/// Serializable summary of a registered check
#[derive(Debug, Clone, Serialize)]
pub struct CheckInfo {
    pub id: String,
    pub service: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub severity: Severity,
    pub global: bool,
}

impl CheckInfo {
    fn of(check: &dyn AuditCheck) -> Self {
        Self {
            id: check.id().to_string(),
            service: check.service().to_string(),
            name: check.name().to_string(),
            description: check.description().to_string(),
            kind: check.kind(),
            severity: check.severity(),
            global: check.is_global(),
        }
    }
}

/// Collection of registered checks
pub struct CheckRegistry {
    checks: Vec<Arc<dyn AuditCheck>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn register(&mut self, check: Arc<dyn AuditCheck>) {
        self.checks.push(check);
    }

    pub fn checks(&self) -> &[Arc<dyn AuditCheck>] {
        &self.checks
    }

    pub fn filter_by_id(&self, id: &str) -> Option<&Arc<dyn AuditCheck>> {
        self.checks.iter().find(|c| c.id() == id)
    }

    pub fn filter_by_service(&self, service: &str) -> Vec<&Arc<dyn AuditCheck>> {
        self.checks.iter().filter(|c| c.service() == service).collect()
    }

    /// Distinct service names, sorted
    pub fn services(&self) -> Vec<&str> {
        self.checks
            .iter()
            .map(|c| c.service())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolve a selection of check ids and service names.
    ///
    /// An empty selection means every registered check. The result keeps
    /// registration order and contains each check once.
    pub fn select(&self, selectors: &[String]) -> Result<Vec<Arc<dyn AuditCheck>>> {
        if selectors.is_empty() {
            return Ok(self.checks.clone());
        }

        let mut unknown = Vec::new();
        for selector in selectors {
            let known = self.filter_by_id(selector).is_some()
                || self.checks.iter().any(|c| c.service() == selector);
            if !known {
                unknown.push(selector.as_str());
            }
        }
        if !unknown.is_empty() {
            return Err(AuditError::Config(format!(
                "unknown check or service: {}",
                unknown.join(", ")
            )));
        }

        Ok(self
            .checks
            .iter()
            .filter(|c| {
                selectors
                    .iter()
                    .any(|s| s == c.id() || s == c.service())
            })
            .cloned()
            .collect())
    }

    pub fn describe(&self) -> Vec<CheckInfo> {
        self.checks.iter().map(|c| CheckInfo::of(c.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry holding every shipped check
pub fn default_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    services::register_checks(&mut registry);
    registry
}
