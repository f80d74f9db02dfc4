//! In-memory resource API for check tests

use chrono::{DateTime, TimeZone, Utc};
use skyaudit_core::{
    AccessKey, AccountSummary, Address, Alarm, AuditError, BackupVault, Bucket, CheckParams,
    Credentials, DbInstance, ExclusionContext, ExclusionRule, ExecutionContext, FailureKind,
    Function, Instance, LoadBalancer, NatGateway, ResourceApi, Result, SecurityGroup, Session,
    Snapshot, Tags, Volume, WorkItemId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-east-1";

#[derive(Default)]
pub struct FakeApi {
    pub instances: Vec<Instance>,
    pub volumes: Vec<Volume>,
    pub addresses: Vec<Address>,
    pub security_groups: Vec<SecurityGroup>,
    pub buckets: Vec<Bucket>,
    pub snapshots: Vec<Snapshot>,
    pub functions: Vec<Function>,
    pub db_instances: Vec<DbInstance>,
    pub nat_gateways: Vec<NatGateway>,
    pub load_balancers: Vec<LoadBalancer>,
    pub alarms: Vec<Alarm>,
    pub backup_vaults: Vec<BackupVault>,
    pub access_keys: Vec<AccessKey>,
    pub summary: AccountSummary,
    pub cpu: BTreeMap<String, f64>,
    pub invocations: BTreeMap<String, u64>,
    pub bytes_out: BTreeMap<String, u64>,
    pub fail_listing: bool,
    pub metric_calls: Arc<AtomicUsize>,
}

impl FakeApi {
    fn listing<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        if self.fail_listing {
            return Err(AuditError::cloud(FailureKind::AccessDenied, "listing denied"));
        }
        Ok(items.to_vec())
    }

    fn metric(&self, id: &str) -> Option<f64> {
        self.metric_calls.fetch_add(1, Ordering::SeqCst);
        self.cpu.get(id).copied()
    }
}

impl ResourceApi for FakeApi {
    fn list_instances(&self) -> Result<Vec<Instance>> {
        self.listing(&self.instances)
    }

    fn instance_cpu_average(&self, instance_id: &str, _days: u32) -> Result<Option<f64>> {
        Ok(self.metric(instance_id))
    }

    fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.listing(&self.volumes)
    }

    fn list_addresses(&self) -> Result<Vec<Address>> {
        self.listing(&self.addresses)
    }

    fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        self.listing(&self.security_groups)
    }

    fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.listing(&self.buckets)
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.listing(&self.snapshots)
    }

    fn list_functions(&self) -> Result<Vec<Function>> {
        self.listing(&self.functions)
    }

    fn function_invocations(&self, function_name: &str, _days: u32) -> Result<u64> {
        self.metric_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.invocations.get(function_name).copied().unwrap_or(0))
    }

    fn list_db_instances(&self) -> Result<Vec<DbInstance>> {
        self.listing(&self.db_instances)
    }

    fn db_cpu_average(&self, db_instance_id: &str, _days: u32) -> Result<Option<f64>> {
        Ok(self.metric(db_instance_id))
    }

    fn list_nat_gateways(&self) -> Result<Vec<NatGateway>> {
        self.listing(&self.nat_gateways)
    }

    fn nat_bytes_out(&self, nat_gateway_id: &str, _days: u32) -> Result<u64> {
        self.metric_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes_out.get(nat_gateway_id).copied().unwrap_or(0))
    }

    fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        self.listing(&self.load_balancers)
    }

    fn list_alarms(&self) -> Result<Vec<Alarm>> {
        self.listing(&self.alarms)
    }

    fn list_backup_vaults(&self) -> Result<Vec<BackupVault>> {
        self.listing(&self.backup_vaults)
    }

    fn list_access_keys(&self) -> Result<Vec<AccessKey>> {
        self.listing(&self.access_keys)
    }

    fn account_summary(&self) -> Result<AccountSummary> {
        if self.fail_listing {
            return Err(AuditError::cloud(FailureKind::AccessDenied, "summary denied"));
        }
        Ok(self.summary.clone())
    }
}

/// Fixed reference time used by check tests
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - chrono::Duration::days(days)
}

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn session(api: FakeApi) -> Session {
    let credentials = Credentials {
        account_id: ACCOUNT.into(),
        access_key_id: "AKIATEST".into(),
        secret_access_key: "secret".into(),
        session_token: None,
        expiration: None,
    };
    Session::new(ACCOUNT, REGION, Arc::new(credentials), Box::new(api))
}

pub fn context(check_id: &str) -> ExecutionContext {
    context_with(check_id, ExclusionContext::empty(), BTreeMap::new())
}

pub fn context_excluding(check_id: &str, rules: Vec<ExclusionRule>) -> ExecutionContext {
    context_with(check_id, ExclusionContext::new(rules), BTreeMap::new())
}

pub fn context_with(
    check_id: &str,
    exclusions: ExclusionContext,
    thresholds: BTreeMap<String, f64>,
) -> ExecutionContext {
    ExecutionContext::new(
        WorkItemId::new(ACCOUNT, REGION, check_id),
        Arc::new(CheckParams::new(thresholds)),
        Arc::new(exclusions),
        now(),
    )
}
