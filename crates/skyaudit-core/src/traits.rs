//! Core traits that define the audit abstraction layer.
//!
//! The cloud provider is reached only through [`CloudProvider`] and
//! [`ResourceApi`]; checks implement [`AuditCheck`] and receive a [`Session`]
//! plus an [`ExecutionContext`] for every work item.

use crate::error::Result;
use crate::exclusion::{ExclusionContext, Tags};
use crate::report::{CheckKind, Finding, Severity, WorkItemId};
use crate::resources::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle status of an organization member account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    PendingClosure,
    Closed,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "ACTIVE"),
            AccountStatus::Suspended => write!(f, "SUSPENDED"),
            AccountStatus::PendingClosure => write!(f, "PENDING_CLOSURE"),
            AccountStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// An account targeted by a run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Account {
    pub fn active(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: AccountStatus::Active,
            name: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Temporary or ambient credentials for one account
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Parameters of a role assumption request
#[derive(Debug, Clone)]
pub struct AssumeRoleRequest<'a> {
    pub role_arn: &'a str,
    pub session_name: &'a str,
}

/// Organization metadata returned by the access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub id: String,
    pub management_account_id: String,
}

/// One page of the organization account listing
#[derive(Debug, Clone, Default)]
pub struct AccountPage {
    pub accounts: Vec<Account>,
    /// Present while more pages remain
    pub next_token: Option<String>,
}

/// Options applied to every call made through a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiOptions {
    /// Per-call timeout
    pub timeout: Option<Duration>,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Identity and organization calls of the cloud provider
pub trait CloudProvider: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> &str;

    /// Credentials the process is running with
    fn ambient_credentials(&self) -> Result<Credentials>;

    /// Account id of the given credentials
    fn caller_identity(&self, credentials: &Credentials) -> Result<String>;

    /// Exchange `via` for temporary credentials in the role's account
    fn assume_role(
        &self,
        via: &Credentials,
        request: &AssumeRoleRequest<'_>,
    ) -> Result<Credentials>;

    /// Inexpensive organization access check
    fn describe_organization(&self, credentials: &Credentials) -> Result<OrganizationInfo>;

    /// One page of member accounts
    fn list_accounts(
        &self,
        credentials: &Credentials,
        next_token: Option<&str>,
    ) -> Result<AccountPage>;

    /// Read-only resource API bound to one account and region
    fn resource_api(
        &self,
        credentials: &Credentials,
        region: &str,
        options: ApiOptions,
    ) -> Result<Box<dyn ResourceApi>>;
}

/// Read-only list/describe calls against one account and region.
///
/// Every `list_*` call returns the fully drained listing.
pub trait ResourceApi: Send + Sync {
    fn list_instances(&self) -> Result<Vec<Instance>>;

    /// Average CPU percentage over the last `days`, `None` without datapoints
    fn instance_cpu_average(&self, instance_id: &str, days: u32) -> Result<Option<f64>>;

    fn list_volumes(&self) -> Result<Vec<Volume>>;

    fn list_addresses(&self) -> Result<Vec<Address>>;

    fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;

    fn list_buckets(&self) -> Result<Vec<Bucket>>;

    fn list_snapshots(&self) -> Result<Vec<Snapshot>>;

    fn list_functions(&self) -> Result<Vec<Function>>;

    /// Total invocations over the last `days`
    fn function_invocations(&self, function_name: &str, days: u32) -> Result<u64>;

    fn list_db_instances(&self) -> Result<Vec<DbInstance>>;

    /// Average CPU percentage over the last `days`, `None` without datapoints
    fn db_cpu_average(&self, db_instance_id: &str, days: u32) -> Result<Option<f64>>;

    fn list_nat_gateways(&self) -> Result<Vec<NatGateway>>;

    /// Bytes sent to destinations over the last `days`
    fn nat_bytes_out(&self, nat_gateway_id: &str, days: u32) -> Result<u64>;

    /// Load balancers with target health already resolved
    fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>>;

    fn list_alarms(&self) -> Result<Vec<Alarm>>;

    fn list_backup_vaults(&self) -> Result<Vec<BackupVault>>;

    fn list_access_keys(&self) -> Result<Vec<AccessKey>>;

    fn account_summary(&self) -> Result<AccountSummary>;
}

/// Capability bound to one account and one region
///
/// Created per work item and dropped when the item completes.
pub struct Session {
    account_id: String,
    region: String,
    credentials: Arc<Credentials>,
    api: Box<dyn ResourceApi>,
}

impl Session {
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        credentials: Arc<Credentials>,
        api: Box<dyn ResourceApi>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            credentials,
            api,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn api(&self) -> &dyn ResourceApi {
        self.api.as_ref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("region", &self.region)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Named numeric thresholds handed to checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckParams {
    thresholds: BTreeMap<String, f64>,
}

impl CheckParams {
    pub fn new(thresholds: BTreeMap<String, f64>) -> Self {
        Self { thresholds }
    }

    /// Threshold value, or `default` when unset
    pub fn threshold(&self, name: &str, default: f64) -> f64 {
        self.thresholds.get(name).copied().unwrap_or(default)
    }

    /// Threshold expressed in whole days
    pub fn days(&self, name: &str, default: u32) -> u32 {
        self.threshold(name, default as f64).max(0.0).round() as u32
    }

    pub fn thresholds(&self) -> &BTreeMap<String, f64> {
        &self.thresholds
    }
}

/// Everything a check receives besides its session
///
/// One context is built per work item; the exclusion rules and parameters
/// are shared read-only across all items of a run.
#[derive(Debug)]
pub struct ExecutionContext {
    item: WorkItemId,
    params: Arc<CheckParams>,
    exclusions: Arc<ExclusionContext>,
    as_of: DateTime<Utc>,
    excluded: AtomicUsize,
}

impl ExecutionContext {
    pub fn new(
        item: WorkItemId,
        params: Arc<CheckParams>,
        exclusions: Arc<ExclusionContext>,
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            item,
            params,
            exclusions,
            as_of,
            excluded: AtomicUsize::new(0),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.item.account_id
    }

    pub fn region(&self) -> &str {
        &self.item.region
    }

    pub fn item(&self) -> &WorkItemId {
        &self.item
    }

    pub fn params(&self) -> &CheckParams {
        &self.params
    }

    pub fn exclusions(&self) -> &ExclusionContext {
        &self.exclusions
    }

    /// Reference time for age computations, fixed for the whole run
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Whole days elapsed since `then`
    pub fn days_since(&self, then: DateTime<Utc>) -> i64 {
        (self.as_of - then).num_days()
    }

    /// Resources that survive the exclusion rules, in listing order.
    ///
    /// Call this before any per-resource API request.
    pub fn included<'r, T: TaggedResource>(&self, resources: &'r [T]) -> Vec<&'r T> {
        self.included_by(resources, |r| r.tags(), |r| r.arn(self.account_id(), self.region()))
    }

    /// Same as [`included`](Self::included) with explicit extractors
    pub fn included_by<'r, T, F, A>(&self, resources: &'r [T], tags_of: F, arn_of: A) -> Vec<&'r T>
    where
        F: Fn(&T) -> &Tags,
        A: Fn(&T) -> String,
    {
        let mut kept = Vec::with_capacity(resources.len());
        for resource in resources {
            if self.exclusions.is_excluded(tags_of(resource), &arn_of(resource)) {
                self.excluded.fetch_add(1, Ordering::Relaxed);
            } else {
                kept.push(resource);
            }
        }
        kept
    }

    /// Number of resources skipped so far
    pub fn excluded_count(&self) -> usize {
        self.excluded.load(Ordering::Relaxed)
    }

    /// Start a finding for `resource` with the check's defaults filled in
    pub fn finding<T: TaggedResource>(
        &self,
        check: &dyn AuditCheck,
        resource: &T,
        title: impl Into<String>,
    ) -> Finding {
        Finding::new(
            self.account_id(),
            self.region(),
            check.service(),
            check.id(),
            check.kind(),
            check.severity(),
            resource.arn(self.account_id(), self.region()),
            title,
        )
        .with_detail("resource_name", resource.resource_id())
    }
}

/// A read-only audit check run against one account and region
pub trait AuditCheck: Send + Sync {
    /// Unique identifier, `<service>.<name>`
    fn id(&self) -> &str;

    /// Service the check inspects
    fn service(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// What the check looks for
    fn description(&self) -> &str;

    /// Cost or security
    fn kind(&self) -> CheckKind;

    /// Severity of findings produced by this check
    fn severity(&self) -> Severity;

    /// Global services are queried once per account rather than per region
    fn is_global(&self) -> bool {
        false
    }

    /// Execute the check and return findings
    fn execute(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>>;
}

/// Progress reporting abstraction for UI/CLI
pub trait ProgressReporter: Send + Sync {
    /// Called once when work items have been planned
    fn run_started(&self, total_items: usize);

    /// Called when a work item finishes
    fn item_finished(&self, item: &WorkItemId, succeeded: bool, completed: usize, total: usize);

    /// Called when a finding is recorded
    fn finding_discovered(&self, finding: &Finding);

    /// Called when a work item fails
    fn error(&self, item: &WorkItemId, message: &str);
}

/// No-op progress reporter for silent operation
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn run_started(&self, _total_items: usize) {}
    fn item_finished(
        &self,
        _item: &WorkItemId,
        _succeeded: bool,
        _completed: usize,
        _total: usize,
    ) {
    }
    fn finding_discovered(&self, _finding: &Finding) {}
    fn error(&self, _item: &WorkItemId, _message: &str) {}
}
