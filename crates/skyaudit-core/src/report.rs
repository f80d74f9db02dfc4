//! Report types for audit findings and run results

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity level of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity, should be reviewed
    Low,
    /// Medium severity, should be addressed
    Medium,
    /// High severity, requires prompt attention
    High,
    /// Critical severity, requires immediate action
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" | "med" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" | "crit" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Whether a check looks for waste or for exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Cost,
    Security,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Cost => write!(f, "cost"),
            CheckKind::Security => write!(f, "security"),
        }
    }
}

/// One detected issue tied to a specific resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Account the resource lives in
    pub account_id: String,

    /// Region the resource was found in
    pub region: String,

    /// Service name (ec2, s3, ...)
    pub service: String,

    /// Id of the check that produced the finding
    pub check_id: String,

    /// Cost or security
    #[serde(rename = "type")]
    pub kind: CheckKind,

    /// Severity level
    pub severity: Severity,

    /// Normalized resource identifier (ARN)
    pub resource_id: String,

    /// Short description of the issue
    pub title: String,

    /// Remediation guidance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,

    /// Free-form detail fields
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Finding {
    /// Create a new finding with required fields
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
        check_id: impl Into<String>,
        kind: CheckKind,
        severity: Severity,
        resource_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            service: service.into(),
            check_id: check_id.into(),
            kind,
            severity,
            resource_id: resource_id.into(),
            title: title.into(),
            remediation: None,
            details: BTreeMap::new(),
        }
    }

    /// Set remediation guidance
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Add a detail field
    pub fn with_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Presentation order key: account, region, service, check, resource
    pub fn sort_key(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.account_id,
            &self.region,
            &self.service,
            &self.check_id,
            &self.resource_id,
        )
    }
}

/// Coordinate of one schedulable unit of work
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkItemId {
    pub account_id: String,
    pub region: String,
    pub check_id: String,
}

impl WorkItemId {
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        check_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            check_id: check_id.into(),
        }
    }
}

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.account_id, self.region, self.check_id)
    }
}

/// Stage at which a work item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    /// Session could not be obtained; the check never ran
    Credentials,
    /// The check itself failed
    Check,
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorStage::Credentials => write!(f, "credentials"),
            ErrorStage::Check => write!(f, "check"),
        }
    }
}

/// Failure of a single work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Where the failure happened
    #[serde(flatten)]
    pub item: WorkItemId,

    /// Service of the failed check
    pub service: String,

    /// Failure classification
    pub kind: FailureKind,

    /// Whether the session or the check failed
    pub stage: ErrorStage,

    /// Error message
    pub message: String,

    /// Actionable hint keyed by the failure kind
    pub hint: String,
}

impl ErrorRecord {
    pub fn new(
        item: WorkItemId,
        service: impl Into<String>,
        kind: FailureKind,
        stage: ErrorStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            item,
            service: service.into(),
            kind,
            stage,
            message: message.into(),
            hint: kind.hint().to_string(),
        }
    }
}

/// Summary counters for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Active accounts targeted after exclusions
    pub accounts_requested: usize,

    /// Accounts with at least one completed work item
    pub accounts_scanned: usize,

    /// Suspended or closed accounts skipped by enumeration
    pub accounts_inactive: usize,

    /// Accounts skipped by configuration
    pub accounts_excluded: usize,

    /// Distinct regions with at least one completed work item
    pub regions_scanned: usize,

    /// Distinct services with at least one completed work item
    pub services_checked: usize,

    /// Work items scheduled
    pub work_items_total: usize,

    /// Work items that completed
    pub work_items_succeeded: usize,

    /// Work items that failed
    pub work_items_failed: usize,

    /// Resources skipped by exclusion rules
    pub resources_excluded: usize,

    /// Total findings
    pub total_findings: usize,

    /// Findings grouped by severity
    pub findings_by_severity: BTreeMap<Severity, usize>,

    /// Errors grouped by failure kind
    pub errors_by_kind: BTreeMap<FailureKind, usize>,
}

impl RunSummary {
    /// Update summary with a new finding
    pub fn add_finding(&mut self, severity: Severity) {
        self.total_findings += 1;
        *self.findings_by_severity.entry(severity).or_insert(0) += 1;
    }

    /// Update summary with a new error
    pub fn add_error(&mut self, kind: FailureKind) {
        *self.errors_by_kind.entry(kind).or_insert(0) += 1;
    }

    /// Number of findings at a severity
    pub fn count(&self, severity: Severity) -> usize {
        self.findings_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No findings, no errors
    Clean,
    /// Findings reported, every work item completed
    FindingsOnly,
    /// At least one work item failed; results are partial
    Incomplete,
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Clean | RunStatus::FindingsOnly => 0,
            RunStatus::Incomplete => 2,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Clean => write!(f, "no issues found"),
            RunStatus::FindingsOnly => write!(f, "issues found"),
            RunStatus::Incomplete => write!(f, "scan incomplete due to errors"),
        }
    }
}

/// Requested scope of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunScope {
    pub organization: bool,
    pub regions: Vec<String>,
    pub checks: Vec<String>,
    pub max_workers: usize,
}

/// Complete results of an audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// When the run started
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// When the run completed
    pub completed_at: chrono::DateTime<chrono::Utc>,

    /// What was requested
    pub scope: RunScope,

    /// Findings in presentation order
    pub findings: Vec<Finding>,

    /// Work item failures in presentation order
    pub errors: Vec<ErrorRecord>,

    /// Summary counters
    pub summary: RunSummary,
}

impl RunResult {
    /// Create empty results for a scope
    pub fn new(scope: RunScope) -> Self {
        let now = chrono::Utc::now();
        Self {
            started_at: now,
            completed_at: now,
            scope,
            findings: Vec::new(),
            errors: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.completed_at = chrono::Utc::now();
    }

    /// Overall status
    pub fn status(&self) -> RunStatus {
        if !self.errors.is_empty() {
            RunStatus::Incomplete
        } else if !self.findings.is_empty() {
            RunStatus::FindingsOnly
        } else {
            RunStatus::Clean
        }
    }

    /// Get findings filtered by severity
    pub fn findings_by_severity(&self, severity: Severity) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.severity == severity).collect()
    }

    /// Findings for one account
    pub fn findings_for_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> impl Iterator<Item = &'a Finding> {
        self.findings.iter().filter(move |f| f.account_id == account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new(
            "111111111111",
            "us-east-1",
            "ec2",
            "ec2.idle_instances",
            CheckKind::Cost,
            severity,
            "arn:aws:ec2:us-east-1:111111111111:instance/i-1",
            "Instance idle",
        )
    }

    #[test]
    fn test_status_distinguishes_clean_findings_and_errors() {
        let mut result = RunResult::new(RunScope::default());
        assert_eq!(result.status(), RunStatus::Clean);
        assert_eq!(result.status().exit_code(), 0);

        result.findings.push(finding(Severity::High));
        assert_eq!(result.status(), RunStatus::FindingsOnly);
        assert_eq!(result.status().exit_code(), 0);

        result.errors.push(ErrorRecord::new(
            WorkItemId::new("111111111111", "us-east-1", "s3.public_read"),
            "s3",
            FailureKind::AccessDenied,
            ErrorStage::Check,
            "denied",
        ));
        assert_eq!(result.status(), RunStatus::Incomplete);
        assert_ne!(result.status().exit_code(), 0);
    }

    #[test]
    fn test_summary_counters() {
        let mut summary = RunSummary::default();
        summary.add_finding(Severity::High);
        summary.add_finding(Severity::High);
        summary.add_finding(Severity::Low);
        summary.add_error(FailureKind::Throttled);

        assert_eq!(summary.total_findings, 3);
        assert_eq!(summary.count(Severity::High), 2);
        assert_eq!(summary.count(Severity::Critical), 0);
        assert_eq!(summary.errors_by_kind.get(&FailureKind::Throttled), Some(&1));
    }

    #[test]
    fn test_error_record_carries_hint() {
        let record = ErrorRecord::new(
            WorkItemId::new("1", "us-east-1", "ec2.idle_instances"),
            "ec2",
            FailureKind::RoleNotFound,
            ErrorStage::Credentials,
            "role missing",
        );
        assert_eq!(record.hint, FailureKind::RoleNotFound.hint());
    }

    #[test]
    fn test_finding_json_shape() {
        let finding = finding(Severity::Medium).with_detail("avg_cpu", 1.5);
        let json = serde_json::to_value(finding).unwrap();
        assert_eq!(json["type"], "cost");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["service"], "ec2");
        assert_eq!(json["details"]["avg_cpu"], 1.5);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
    }
}
