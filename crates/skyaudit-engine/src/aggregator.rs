//! Merges per-work-item outcomes into one ordered run result

use skyaudit_core::{
    ErrorRecord, ErrorStage, FailureKind, Finding, NullProgressReporter, ProgressReporter,
    RunResult, RunScope, WorkItemId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// What one work item produced
#[derive(Debug, Clone)]
pub enum WorkOutcome {
    /// The check ran to completion
    Succeeded {
        item: WorkItemId,
        service: String,
        findings: Vec<Finding>,
        /// Resources skipped by exclusion rules
        excluded: usize,
    },
    /// The session or the check failed
    Failed(ErrorRecord),
}

impl WorkOutcome {
    pub fn item(&self) -> &WorkItemId {
        match self {
            WorkOutcome::Succeeded { item, .. } => item,
            WorkOutcome::Failed(record) => &record.item,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkOutcome::Succeeded { .. })
    }
}

/// Sole owner of the mutable run result
///
/// Every planned work item contributes exactly one outcome. Items that never
/// report are turned into error records by [`finish`](Self::finish).
pub struct ResultAggregator {
    result: RunResult,
    planned: BTreeMap<WorkItemId, String>,
    recorded: BTreeSet<WorkItemId>,
    accounts: BTreeSet<String>,
    regions: BTreeSet<String>,
    services: BTreeSet<String>,
    progress: Arc<dyn ProgressReporter>,
}

impl ResultAggregator {
    /// Create an aggregator expecting one outcome per planned item.
    ///
    /// `planned` pairs each work item with its check's service.
    pub fn new(scope: RunScope, planned: impl IntoIterator<Item = (WorkItemId, String)>) -> Self {
        let planned: BTreeMap<_, _> = planned.into_iter().collect();
        let mut result = RunResult::new(scope);
        result.summary.work_items_total = planned.len();

        Self {
            result,
            planned,
            recorded: BTreeSet::new(),
            accounts: BTreeSet::new(),
            regions: BTreeSet::new(),
            services: BTreeSet::new(),
            progress: Arc::new(NullProgressReporter),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of outcomes recorded so far
    pub fn completed(&self) -> usize {
        self.recorded.len()
    }

    /// Record one outcome
    pub fn record(&mut self, outcome: WorkOutcome) {
        let item = outcome.item().clone();
        if !self.planned.contains_key(&item) {
            warn!("Ignoring outcome for unplanned work item {}", item);
            return;
        }
        if !self.recorded.insert(item.clone()) {
            warn!("Ignoring duplicate outcome for {}", item);
            return;
        }

        let succeeded = outcome.is_success();
        match outcome {
            WorkOutcome::Succeeded {
                item,
                service,
                findings,
                excluded,
            } => {
                self.result.summary.work_items_succeeded += 1;
                self.result.summary.resources_excluded += excluded;
                self.accounts.insert(item.account_id);
                self.regions.insert(item.region);
                self.services.insert(service);

                for finding in findings {
                    self.progress.finding_discovered(&finding);
                    self.result.summary.add_finding(finding.severity);
                    self.result.findings.push(finding);
                }
            }
            WorkOutcome::Failed(record) => {
                self.progress.error(&record.item, &record.message);
                self.push_error(record);
            }
        }

        let total = self.result.summary.work_items_total;
        self.progress
            .item_finished(&item, succeeded, self.recorded.len(), total);
    }

    fn push_error(&mut self, record: ErrorRecord) {
        self.result.summary.work_items_failed += 1;
        self.result.summary.add_error(record.kind);
        self.result.errors.push(record);
    }

    /// Record every outcome of an iterator and finish
    pub fn collect(mut self, outcomes: impl IntoIterator<Item = WorkOutcome>) -> RunResult {
        for outcome in outcomes {
            self.record(outcome);
        }
        self.finish()
    }

    /// Restore presentation order and fill in the derived counters
    pub fn finish(mut self) -> RunResult {
        let missing: Vec<_> = self
            .planned
            .iter()
            .filter(|(item, _)| !self.recorded.contains(*item))
            .map(|(item, service)| (item.clone(), service.clone()))
            .collect();

        for (item, service) in missing {
            warn!("Work item {} produced no outcome", item);
            self.push_error(ErrorRecord::new(
                item,
                service,
                FailureKind::Unknown,
                ErrorStage::Check,
                "work item produced no outcome",
            ));
        }

        self.result
            .findings
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.result.errors.sort_by(|a, b| a.item.cmp(&b.item));

        let summary = &mut self.result.summary;
        summary.accounts_scanned = self.accounts.len();
        summary.regions_scanned = self.regions.len();
        summary.services_checked = self.services.len();

        self.result.complete();
        self.result
    }
}
