//! Work item planning and bounded concurrent execution

use crate::aggregator::{ResultAggregator, WorkOutcome};
use crate::credentials::CredentialResolver;
use chrono::{DateTime, Utc};
use skyaudit_core::{
    AuditCheck, AuditError, CheckParams, ErrorRecord, ErrorStage, ExclusionContext,
    ExecutionContext, FailureKind, NullProgressReporter, ProgressReporter, Result, RunResult,
    RunScope, WorkItemId,
};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use tracing::{debug, info, warn};

/// One schedulable (account, region, check) unit
#[derive(Clone)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub check: Arc<dyn AuditCheck>,
}

impl WorkItem {
    pub fn service(&self) -> &str {
        self.check.service()
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WorkItem").field(&self.id).finish()
    }
}

/// Deduplicated, ordered set of work items for one run
#[derive(Debug, Clone, Default)]
pub struct WorkPlan {
    items: Vec<WorkItem>,
}

impl WorkPlan {
    /// Expand accounts, regions, and checks into work items.
    ///
    /// Items are ordered check by check, region by region, account by
    /// account, so consecutive items land on different (account, region)
    /// pairs. Global checks are planned for the first region only.
    pub fn build(accounts: &[String], regions: &[String], checks: &[Arc<dyn AuditCheck>]) -> Self {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for check in checks {
            let check_regions = if check.is_global() {
                regions.get(..1).unwrap_or_default()
            } else {
                regions
            };

            for region in check_regions {
                for account in accounts {
                    let id = WorkItemId::new(account.as_str(), region.as_str(), check.id());
                    if seen.insert(id.clone()) {
                        items.push(WorkItem {
                            id,
                            check: Arc::clone(check),
                        });
                    }
                }
            }
        }

        Self { items }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }
}

/// Immutable inputs shared by every work item of a run
#[derive(Clone)]
pub struct SchedulerContext {
    pub resolver: Arc<CredentialResolver>,
    pub params: Arc<CheckParams>,
    pub exclusions: Arc<ExclusionContext>,
    /// Reference time for age computations
    pub as_of: DateTime<Utc>,
    pub scope: RunScope,
}

/// Runs work items on a fixed-size worker pool
pub struct WorkScheduler {
    max_workers: usize,
    progress: Arc<dyn ProgressReporter>,
}

impl WorkScheduler {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            progress: Arc::new(NullProgressReporter),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Execute every item of the plan and aggregate the outcomes.
    ///
    /// Workers send outcomes over a channel; aggregation happens on the
    /// calling thread.
    pub fn run(&self, plan: WorkPlan, ctx: &SchedulerContext) -> Result<RunResult> {
        let planned: Vec<_> = plan
            .items()
            .iter()
            .map(|item| (item.id.clone(), item.service().to_string()))
            .collect();
        let mut aggregator = ResultAggregator::new(ctx.scope.clone(), planned)
            .with_progress(Arc::clone(&self.progress));

        let total = plan.len();
        self.progress.run_started(total);
        if plan.is_empty() {
            warn!("No work items to run");
            return Ok(aggregator.finish());
        }

        let workers = self.max_workers.min(total);
        info!("Running {} work items on {} workers", total, workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("skyaudit-worker-{}", idx))
            .build()
            .map_err(|e| AuditError::WorkerPool(e.to_string()))?;

        let (tx, rx) = mpsc::channel();
        for item in plan.into_items() {
            let tx = tx.clone();
            let ctx = ctx.clone();
            pool.spawn_fifo(move || {
                let outcome = execute_guarded(item, &ctx);
                // The receiver only goes away if the caller stopped aggregating
                let _ = tx.send(outcome);
            });
        }
        drop(tx);

        for outcome in rx {
            aggregator.record(outcome);
        }

        Ok(aggregator.finish())
    }
}

/// Run one item, converting panics into error records
fn execute_guarded(item: WorkItem, ctx: &SchedulerContext) -> WorkOutcome {
    let id = item.id.clone();
    let service = item.service().to_string();

    match catch_unwind(AssertUnwindSafe(|| execute(item, ctx))) {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "check panicked".to_string());
            warn!("Work item {} panicked: {}", id, message);
            WorkOutcome::Failed(ErrorRecord::new(
                id,
                service,
                FailureKind::Unknown,
                ErrorStage::Check,
                format!("panic: {}", message),
            ))
        }
    }
}

fn execute(item: WorkItem, ctx: &SchedulerContext) -> WorkOutcome {
    let WorkItem { id, check } = item;
    let service = check.service().to_string();

    let session = match ctx.resolver.resolve(&id.account_id, &id.region) {
        Ok(session) => session,
        Err(e) => {
            warn!("No session for {}: {}", id, e);
            return WorkOutcome::Failed(ErrorRecord::new(
                id,
                service,
                e.kind(),
                ErrorStage::Credentials,
                e.detail(),
            ));
        }
    };

    let exec = ExecutionContext::new(
        id.clone(),
        Arc::clone(&ctx.params),
        Arc::clone(&ctx.exclusions),
        ctx.as_of,
    );

    match check.execute(&session, &exec) {
        Ok(findings) => {
            debug!("{}: {} findings", id, findings.len());
            WorkOutcome::Succeeded {
                item: id,
                service,
                findings,
                excluded: exec.excluded_count(),
            }
        }
        Err(e) => {
            warn!("Check {} failed: {}", id, e);
            WorkOutcome::Failed(ErrorRecord::new(
                id,
                service,
                e.kind(),
                ErrorStage::Check,
                e.detail(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyaudit_checks::default_registry;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_plan_cross_product() {
        let registry = default_registry();
        let checks = registry
            .select(&strings(&[
                "ec2.idle_instances",
                "ebs.orphan_volumes",
                "s3.public_read",
                "rds.idle_instances",
            ]))
            .unwrap();
        let accounts = strings(&["111111111111", "222222222222"]);
        let regions = strings(&["us-east-1", "eu-west-1", "ap-south-1"]);

        let plan = WorkPlan::build(&accounts, &regions, &checks);
        assert_eq!(plan.len(), 24);

        let unique: HashSet<_> = plan.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn test_plan_interleaves_pairs() {
        let registry = default_registry();
        let checks = registry.select(&strings(&["ebs.orphan_volumes"])).unwrap();
        let plan = WorkPlan::build(
            &strings(&["111111111111"]),
            &strings(&["us-east-1", "eu-west-1", "ap-south-1"]),
            &checks,
        );

        let regions: Vec<_> = plan.items().iter().map(|i| i.id.region.as_str()).collect();
        assert_eq!(regions, vec!["us-east-1", "eu-west-1", "ap-south-1"]);
    }

    #[test]
    fn test_plan_deduplicates() {
        let registry = default_registry();
        let checks = registry.select(&strings(&["ebs.orphan_volumes"])).unwrap();
        let plan = WorkPlan::build(
            &strings(&["111111111111", "111111111111"]),
            &strings(&["us-east-1", "us-east-1"]),
            &checks,
        );
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_global_checks_run_once_per_account() {
        let registry = default_registry();
        let checks = registry.select(&strings(&["iam"])).unwrap();
        let plan = WorkPlan::build(
            &strings(&["111111111111", "222222222222"]),
            &strings(&["eu-west-1", "us-east-1"]),
            &checks,
        );

        assert_eq!(plan.len(), 4);
        assert!(plan.items().iter().all(|i| i.id.region == "eu-west-1"));
    }

    #[test]
    fn test_plan_without_regions_is_empty() {
        let registry = default_registry();
        let plan = WorkPlan::build(&strings(&["111111111111"]), &[], registry.checks());
        assert!(plan.is_empty());
    }
}
