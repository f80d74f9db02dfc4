//! Audit runner that composes enumeration, scheduling, and aggregation

use crate::accounts::{AccountEnumerator, AccountSet, ScanMode};
use crate::credentials::{CredentialResolver, RoleSettings};
use crate::scheduler::{SchedulerContext, WorkPlan, WorkScheduler};
use chrono::{DateTime, Utc};
use skyaudit_core::{
    AuditCheck, AuditError, CloudProvider, NullProgressReporter, ProgressReporter, Result,
    RunResult, RunScope, Settings,
};
use std::sync::Arc;
use tracing::info;

/// Runs one audit from resolved settings
pub struct AuditRunner {
    provider: Arc<dyn CloudProvider>,
    settings: Settings,
    checks: Vec<Arc<dyn AuditCheck>>,
    progress: Arc<dyn ProgressReporter>,
    as_of: Option<DateTime<Utc>>,
}

impl AuditRunner {
    /// Create a runner with no checks
    pub fn new(provider: Arc<dyn CloudProvider>, settings: Settings) -> Self {
        Self {
            provider,
            settings,
            checks: Vec::new(),
            progress: Arc::new(NullProgressReporter),
            as_of: None,
        }
    }

    /// Set the checks to run
    pub fn with_checks(mut self, checks: Vec<Arc<dyn AuditCheck>>) -> Self {
        self.checks = checks;
        self
    }

    /// Set the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Pin the reference time used for age thresholds
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn mode(&self) -> ScanMode {
        if self.settings.organization {
            ScanMode::Organization
        } else {
            ScanMode::Single
        }
    }

    fn resolver(&self) -> Result<CredentialResolver> {
        CredentialResolver::discover(
            Arc::clone(&self.provider),
            RoleSettings::from_settings(&self.settings),
        )
    }

    /// Enumerate target accounts without scheduling any work
    pub fn enumerate_accounts(&self) -> Result<AccountSet> {
        let resolver = self.resolver()?;
        AccountEnumerator::new(&resolver).enumerate(self.mode())
    }

    /// Run the audit.
    ///
    /// Configuration errors and a failed organization access check abort
    /// before any work item is scheduled. Everything after that degrades to
    /// per-item error records.
    pub fn run(&self) -> Result<RunResult> {
        self.settings.validate()?;
        let exclusions = Arc::new(self.settings.exclude.exclusion_context()?);
        let regions = self.settings.effective_regions();
        if regions.is_empty() {
            return Err(AuditError::Config("every requested region is excluded".to_string()));
        }

        info!(
            "Starting audit with provider {} (profile {})",
            self.provider.name(),
            self.settings.profile
        );

        let resolver = Arc::new(self.resolver()?);
        let accounts = AccountEnumerator::new(&resolver).enumerate(self.mode())?;

        let (targets, excluded): (Vec<_>, Vec<_>) = accounts
            .active
            .iter()
            .map(|a| a.id.clone())
            .partition(|id| !self.settings.exclude.excludes_account(id));
        if !excluded.is_empty() {
            info!("Skipping {} excluded accounts", excluded.len());
        }

        let checks: Vec<_> = self
            .checks
            .iter()
            .filter(|c| !self.settings.exclude.excludes_service(c.service()))
            .cloned()
            .collect();

        let plan = WorkPlan::build(&targets, &regions, &checks);
        info!(
            "Planned {} work items: {} accounts x {} regions x {} checks",
            plan.len(),
            targets.len(),
            regions.len(),
            checks.len()
        );

        let ctx = SchedulerContext {
            resolver,
            params: Arc::new(self.settings.check_params()),
            exclusions,
            as_of: self.as_of.unwrap_or_else(Utc::now),
            scope: RunScope {
                organization: self.settings.organization,
                regions,
                checks: checks.iter().map(|c| c.id().to_string()).collect(),
                max_workers: self.settings.max_workers,
            },
        };

        let mut result = WorkScheduler::new(self.settings.max_workers)
            .with_progress(Arc::clone(&self.progress))
            .run(plan, &ctx)?;

        result.summary.accounts_requested = targets.len();
        result.summary.accounts_inactive = accounts.inactive.len();
        result.summary.accounts_excluded = excluded.len();

        info!(
            "Audit completed: {} findings, {} errors ({})",
            result.summary.total_findings,
            result.errors.len(),
            result.status()
        );

        Ok(result)
    }
}
