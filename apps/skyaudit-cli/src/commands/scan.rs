//! Audit scan command

use super::{fatal, open_provider, GlobalOptions};
use clap::Args;
use skyaudit_checks::default_registry;
use skyaudit_core::{Finding, ProgressReporter, SettingsOverrides, WorkItemId};
use skyaudit_engine::{render, AuditRunner, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Args)]
pub struct ScanArgs {
    /// Scan every active account of the organization
    #[arg(long)]
    organization: bool,

    /// Regions to scan
    #[arg(short, long, value_delimiter = ',')]
    regions: Vec<String>,

    /// Check ids or service names to run (default: all)
    #[arg(long, value_delimiter = ',')]
    checks: Vec<String>,

    /// Maximum concurrent work items
    #[arg(long)]
    max_workers: Option<usize>,

    /// Account used for organization calls and role chaining
    #[arg(long)]
    org_admin_account: Option<String>,

    /// Role assumed in member accounts
    #[arg(long)]
    role: Option<String>,

    /// Inventory snapshot serving the cloud API
    #[arg(long)]
    inventory: PathBuf,

    /// Output format (text, json, csv)
    #[arg(short, long)]
    format: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ScanArgs {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            organization: self.organization.then_some(true),
            regions: (!self.regions.is_empty()).then(|| self.regions.clone()),
            max_workers: self.max_workers,
            cross_account_role: self.role.clone(),
            org_admin_account_id: self.org_admin_account.clone(),
            api_timeout_secs: None,
            output: self.format.clone(),
        }
    }
}

/// Logs run progress
struct LogProgress;

impl ProgressReporter for LogProgress {
    fn run_started(&self, total_items: usize) {
        info!("Scheduling {} work items", total_items);
    }

    fn item_finished(
        &self,
        item: &WorkItemId,
        succeeded: bool,
        completed: usize,
        total: usize,
    ) {
        debug!(
            "[{}/{}] {} {}",
            completed,
            total,
            item,
            if succeeded { "done" } else { "failed" }
        );
        if completed == total || completed % 50 == 0 {
            info!("Progress: {}/{} work items", completed, total);
        }
    }

    fn finding_discovered(&self, finding: &Finding) {
        debug!("Finding: {} {}", finding.check_id, finding.resource_id);
    }

    fn error(&self, item: &WorkItemId, message: &str) {
        warn!("{}: {}", item, message);
    }
}

pub fn run(args: ScanArgs, global: &GlobalOptions) -> anyhow::Result<()> {
    let settings = global.settings(args.overrides())?;
    let format: OutputFormat = settings.output.parse().map_err(anyhow::Error::msg)?;
    let checks = default_registry().select(&args.checks)?;
    let provider = open_provider(&args.inventory)?;

    let results = AuditRunner::new(provider, settings)
        .with_checks(checks)
        .with_progress(Arc::new(LogProgress))
        .run()
        .map_err(fatal)?;

    let report = render(&results, format)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, report)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", report),
    }

    // Partial results when any work item failed
    let code = results.status().exit_code();
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
