//! Output formatting for run results

use serde::{Deserialize, Serialize};
use skyaudit_core::{AuditError, Result, RunResult, Severity};

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "console" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Render results in the requested format
pub fn render(results: &RunResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_text(results)),
        OutputFormat::Json => format_json(results, true),
        OutputFormat::Csv => format_csv(results),
    }
}

/// Format run results as text
pub fn format_text(results: &RunResult) -> String {
    let mut output = String::new();

    // Header
    output.push_str(&format!("Skyaudit Report\n{}\n\n", "=".repeat(15)));

    // Scope
    let scope = &results.scope;
    output.push_str(&format!(
        "Mode: {}\n",
        if scope.organization { "organization" } else { "single account" }
    ));
    output.push_str(&format!("Regions: {}\n", scope.regions.join(", ")));
    output.push_str(&format!("Checks: {}\n", scope.checks.len()));
    output.push_str(&format!("Workers: {}\n", scope.max_workers));
    output.push_str(&format!(
        "Duration: {}ms\n\n",
        (results.completed_at - results.started_at).num_milliseconds()
    ));

    // Summary
    let summary = &results.summary;
    output.push_str("Summary\n-------\n");
    output.push_str(&format!(
        "Accounts: {} scanned of {} requested ({} inactive, {} excluded)\n",
        summary.accounts_scanned,
        summary.accounts_requested,
        summary.accounts_inactive,
        summary.accounts_excluded
    ));
    output.push_str(&format!("Regions scanned: {}\n", summary.regions_scanned));
    output.push_str(&format!("Services checked: {}\n", summary.services_checked));
    output.push_str(&format!(
        "Work items: {} ({} succeeded, {} failed)\n",
        summary.work_items_total, summary.work_items_succeeded, summary.work_items_failed
    ));
    output.push_str(&format!("Resources excluded: {}\n\n", summary.resources_excluded));

    output.push_str("Findings by Severity\n--------------------\n");
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        output.push_str(&format!("{}: {}\n", severity, summary.count(severity)));
    }
    output.push('\n');

    // Findings grouped by account
    if !results.findings.is_empty() {
        output.push_str("Findings\n--------\n");

        let mut current_account = None;
        for finding in &results.findings {
            if current_account != Some(finding.account_id.as_str()) {
                current_account = Some(finding.account_id.as_str());
                output.push_str(&format!("\nAccount {}\n", finding.account_id));
            }

            output.push_str(&format!(
                "  [{}] {} {}: {}\n",
                finding.severity.to_string().to_uppercase(),
                finding.region,
                finding.check_id,
                finding.title
            ));
            output.push_str(&format!("    Resource: {}\n", finding.resource_id));
            if let Some(remediation) = &finding.remediation {
                output.push_str(&format!("    Remediation: {}\n", remediation));
            }
        }
        output.push('\n');
    }

    // Errors
    if !results.errors.is_empty() {
        output.push_str("Errors\n------\n");
        for error in &results.errors {
            output.push_str(&format!(
                "[{}] {} ({} stage): {}\n",
                error.kind, error.item, error.stage, error.message
            ));
            output.push_str(&format!("    Hint: {}\n", error.hint));
        }

        let counts: Vec<_> = summary
            .errors_by_kind
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        output.push_str(&format!("Error counts: {}\n\n", counts.join(", ")));
    }

    output.push_str(&format!(
        "Status: {} ({} findings, {} errors)\n",
        results.status(),
        summary.total_findings,
        results.errors.len()
    ));

    output
}

/// Format run results as JSON
pub fn format_json(results: &RunResult, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(results).map_err(Into::into)
    } else {
        serde_json::to_string(results).map_err(Into::into)
    }
}

const CSV_HEADER: &str =
    "account_id,region,service,check_id,type,severity,resource_id,title,details";

/// Format findings as CSV, one row per finding
pub fn format_csv(results: &RunResult) -> Result<String> {
    let mut output = String::from(CSV_HEADER);
    output.push('\n');

    for finding in &results.findings {
        let details = serde_json::to_string(&finding.details)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        let row = [
            finding.account_id.as_str(),
            finding.region.as_str(),
            finding.service.as_str(),
            finding.check_id.as_str(),
            &finding.kind.to_string(),
            &finding.severity.to_string(),
            finding.resource_id.as_str(),
            finding.title.as_str(),
            &details,
        ];
        let fields: Vec<_> = row.iter().map(|f| csv_field(f)).collect();
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    Ok(output)
}

/// Quote a field when it contains a delimiter, quote, or line break
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
