//! Inventory-backed implementation of the provider traits

use crate::inventory::{AccountInventory, Call, Inventory, RegionInventory};
use skyaudit_core::{
    AccessKey, AccountPage, AccountSummary, Address, Alarm, ApiOptions, AssumeRoleRequest,
    AuditError, BackupVault, Bucket, CloudProvider, Credentials, DbInstance, FailureKind,
    Function, Instance, LoadBalancer, NatGateway, OrganizationInfo, ResourceApi, Result,
    SecurityGroup, Snapshot, Volume,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared state behind the provider and every resource API it hands out
struct Shared {
    inventory: Inventory,
    fault_hits: Vec<AtomicU32>,
    calls: AtomicU64,
    issued: AtomicU64,
}

impl Shared {
    /// Fail the call when an active fault matches it
    fn check_faults(&self, call: Call<'_>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        for (fault, hits) in self.inventory.faults.iter().zip(&self.fault_hits) {
            if !fault.matches(&call) {
                continue;
            }
            match fault.times {
                None => return Err(fault.to_error(&call)),
                Some(limit) => {
                    let previous = hits.fetch_add(1, Ordering::SeqCst);
                    if previous < limit {
                        return Err(fault.to_error(&call));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Cloud provider serving answers from an [`Inventory`]
#[derive(Clone)]
pub struct InventoryProvider {
    shared: Arc<Shared>,
}

impl InventoryProvider {
    /// Create a provider over an inventory
    pub fn new(inventory: Inventory) -> Self {
        let fault_hits = inventory.faults.iter().map(|_| AtomicU32::new(0)).collect();
        Self {
            shared: Arc::new(Shared {
                inventory,
                fault_hits,
                calls: AtomicU64::new(0),
                issued: AtomicU64::new(0),
            }),
        }
    }

    /// Load an inventory file and create a provider over it
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(Inventory::from_file(path)?))
    }

    pub fn inventory(&self) -> &Inventory {
        &self.shared.inventory
    }

    /// Number of provider calls served so far, faults included
    pub fn call_count(&self) -> u64 {
        self.shared.calls.load(Ordering::Relaxed)
    }

    fn account(&self, account_id: &str) -> Option<&AccountInventory> {
        self.shared.inventory.accounts.get(account_id)
    }

    fn organization_access(&self, credentials: &Credentials, operation: &str) -> Result<()> {
        self.shared.check_faults(Call {
            account: Some(&credentials.account_id),
            region: None,
            service: Some("organizations"),
            operation,
        })?;

        let org = self.shared.inventory.organization.as_ref().ok_or_else(|| {
            AuditError::cloud(
                FailureKind::NotInOrganization,
                format!(
                    "account {} is not a member of an organization",
                    credentials.account_id
                ),
            )
        })?;

        if !org.can_list(&credentials.account_id) {
            return Err(AuditError::cloud(
                FailureKind::AccessDenied,
                format!(
                    "account {} is not allowed to call {}",
                    credentials.account_id, operation
                ),
            ));
        }
        Ok(())
    }
}

/// Parse `arn:aws:iam::<account>:role/<name>`
fn parse_role_arn(role_arn: &str) -> Option<(&str, &str)> {
    let rest = role_arn.strip_prefix("arn:aws:iam::")?;
    let (account, resource) = rest.split_once(':')?;
    let name = resource.strip_prefix("role/")?;
    if account.is_empty() || name.is_empty() {
        return None;
    }
    Some((account, name))
}

impl CloudProvider for InventoryProvider {
    fn name(&self) -> &str {
        "inventory"
    }

    fn ambient_credentials(&self) -> Result<Credentials> {
        let caller = &self.shared.inventory.caller;
        Ok(Credentials {
            account_id: caller.account_id.clone(),
            access_key_id: caller.access_key_id.clone(),
            secret_access_key: "inventory-ambient-secret".to_string(),
            session_token: None,
            expiration: None,
        })
    }

    fn caller_identity(&self, credentials: &Credentials) -> Result<String> {
        self.shared.check_faults(Call {
            account: Some(&credentials.account_id),
            region: None,
            service: Some("sts"),
            operation: "get_caller_identity",
        })?;
        Ok(credentials.account_id.clone())
    }

    fn assume_role(
        &self,
        via: &Credentials,
        request: &AssumeRoleRequest<'_>,
    ) -> Result<Credentials> {
        let (target, role_name) = parse_role_arn(request.role_arn).ok_or_else(|| {
            AuditError::cloud(
                FailureKind::Unknown,
                format!("malformed role ARN '{}'", request.role_arn),
            )
        })?;

        self.shared.check_faults(Call {
            account: Some(target),
            region: None,
            service: Some("sts"),
            operation: "assume_role",
        })?;

        let inventory = &self.shared.inventory;
        if !inventory.account_exists(target) {
            return Err(AuditError::cloud(
                FailureKind::NotFound,
                format!("account {} does not exist", target),
            ));
        }

        let role = self
            .account(target)
            .and_then(|a| a.role(role_name))
            .ok_or_else(|| {
                AuditError::cloud(
                    FailureKind::RoleNotFound,
                    format!("role {} not found in account {}", role_name, target),
                )
            })?;

        let trusted = if role.trusted_accounts.is_empty() {
            inventory
                .organization
                .as_ref()
                .map(|o| o.can_list(&via.account_id))
                .unwrap_or(false)
        } else {
            role.trusted_accounts.iter().any(|a| *a == via.account_id)
        };

        if !trusted {
            return Err(AuditError::cloud(
                FailureKind::AccessDenied,
                format!(
                    "account {} is not trusted to assume {}",
                    via.account_id, request.role_arn
                ),
            ));
        }

        let serial = self.shared.issued.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Issued credentials for {} via {} ({})",
            target, via.account_id, request.session_name
        );

        Ok(Credentials {
            account_id: target.to_string(),
            access_key_id: format!("ASIA{}{:06}", target, serial),
            secret_access_key: format!("inventory-secret-{}-{}", target, serial),
            session_token: Some(format!("{}:{}", request.session_name, serial)),
            expiration: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        })
    }

    fn describe_organization(&self, credentials: &Credentials) -> Result<OrganizationInfo> {
        self.organization_access(credentials, "describe_organization")?;
        let org = self
            .shared
            .inventory
            .organization
            .as_ref()
            .ok_or_else(|| AuditError::cloud(FailureKind::NotInOrganization, "no organization"))?;

        Ok(OrganizationInfo {
            id: org.id.clone(),
            management_account_id: org.management_account_id.clone(),
        })
    }

    fn list_accounts(
        &self,
        credentials: &Credentials,
        next_token: Option<&str>,
    ) -> Result<AccountPage> {
        self.organization_access(credentials, "list_accounts")?;
        let org = self
            .shared
            .inventory
            .organization
            .as_ref()
            .ok_or_else(|| AuditError::cloud(FailureKind::NotInOrganization, "no organization"))?;

        let start = match next_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| {
                    AuditError::cloud(
                        FailureKind::Unknown,
                        format!("invalid next token '{}'", token),
                    )
                })?,
        };

        let end = (start + org.page_size).min(org.accounts.len());
        let accounts = org.accounts.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < org.accounts.len()).then(|| format!("page-{}", end));

        Ok(AccountPage {
            accounts,
            next_token,
        })
    }

    fn resource_api(
        &self,
        credentials: &Credentials,
        region: &str,
        options: ApiOptions,
    ) -> Result<Box<dyn ResourceApi>> {
        self.shared.check_faults(Call {
            account: Some(&credentials.account_id),
            region: Some(region),
            service: None,
            operation: "resource_api",
        })?;

        Ok(Box::new(InventoryResourceApi {
            shared: Arc::clone(&self.shared),
            account_id: credentials.account_id.clone(),
            region: region.to_string(),
            options,
        }))
    }
}

/// Resource API scoped to the account of the credentials it was created with
struct InventoryResourceApi {
    shared: Arc<Shared>,
    account_id: String,
    region: String,
    options: ApiOptions,
}

impl InventoryResourceApi {
    /// Apply faults and simulated latency, then hand out the region data
    fn call(&self, service: &str, operation: &str) -> Result<Option<&RegionInventory>> {
        self.shared.check_faults(Call {
            account: Some(&self.account_id),
            region: Some(&self.region),
            service: Some(service),
            operation,
        })?;

        if let Some(latency) = self.shared.inventory.latency_ms.get(&self.region) {
            let latency = Duration::from_millis(*latency);
            match self.options.timeout {
                Some(timeout) if latency > timeout => {
                    std::thread::sleep(timeout);
                    return Err(AuditError::cloud(
                        FailureKind::Timeout,
                        format!("{} in {} timed out after {:?}", operation, self.region, timeout),
                    ));
                }
                _ => std::thread::sleep(latency),
            }
        }

        Ok(self
            .shared
            .inventory
            .accounts
            .get(&self.account_id)
            .and_then(|a| a.regions.get(&self.region)))
    }

    fn iam(&self, operation: &str) -> Result<Option<&AccountInventory>> {
        self.call("iam", operation)?;
        Ok(self.shared.inventory.accounts.get(&self.account_id))
    }

    fn list<T: Clone>(
        &self,
        service: &str,
        operation: &str,
        select: impl Fn(&RegionInventory) -> &Vec<T>,
    ) -> Result<Vec<T>> {
        Ok(self
            .call(service, operation)?
            .map(|region| select(region).clone())
            .unwrap_or_default())
    }
}

impl ResourceApi for InventoryResourceApi {
    fn list_instances(&self) -> Result<Vec<Instance>> {
        self.list("ec2", "list_instances", |r| &r.instances)
    }

    fn instance_cpu_average(&self, instance_id: &str, _days: u32) -> Result<Option<f64>> {
        Ok(self
            .call("ec2", "instance_cpu_average")?
            .and_then(|r| r.cpu_average.get(instance_id).copied()))
    }

    fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.list("ebs", "list_volumes", |r| &r.volumes)
    }

    fn list_addresses(&self) -> Result<Vec<Address>> {
        self.list("eip", "list_addresses", |r| &r.addresses)
    }

    fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        self.list("sg", "list_security_groups", |r| &r.security_groups)
    }

    fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.list("s3", "list_buckets", |r| &r.buckets)
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.list("snapshots", "list_snapshots", |r| &r.snapshots)
    }

    fn list_functions(&self) -> Result<Vec<Function>> {
        self.list("lambda", "list_functions", |r| &r.functions)
    }

    fn function_invocations(&self, function_name: &str, _days: u32) -> Result<u64> {
        Ok(self
            .call("lambda", "function_invocations")?
            .and_then(|r| r.invocations.get(function_name).copied())
            .unwrap_or(0))
    }

    fn list_db_instances(&self) -> Result<Vec<DbInstance>> {
        self.list("rds", "list_db_instances", |r| &r.db_instances)
    }

    fn db_cpu_average(&self, db_instance_id: &str, _days: u32) -> Result<Option<f64>> {
        Ok(self
            .call("rds", "db_cpu_average")?
            .and_then(|r| r.cpu_average.get(db_instance_id).copied()))
    }

    fn list_nat_gateways(&self) -> Result<Vec<NatGateway>> {
        self.list("nat", "describe_nat_gateways", |r| &r.nat_gateways)
    }

    fn nat_bytes_out(&self, nat_gateway_id: &str, _days: u32) -> Result<u64> {
        Ok(self
            .call("nat", "nat_bytes_out")?
            .and_then(|r| r.nat_bytes_out.get(nat_gateway_id).copied())
            .unwrap_or(0))
    }

    fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        self.list("lb", "describe_load_balancers", |r| &r.load_balancers)
    }

    fn list_alarms(&self) -> Result<Vec<Alarm>> {
        self.list("cloudwatch", "describe_alarms", |r| &r.alarms)
    }

    fn list_backup_vaults(&self) -> Result<Vec<BackupVault>> {
        self.list("backup", "list_backup_vaults", |r| &r.backup_vaults)
    }

    fn list_access_keys(&self) -> Result<Vec<AccessKey>> {
        Ok(self
            .iam("list_access_keys")?
            .map(|a| a.iam.access_keys.clone())
            .unwrap_or_default())
    }

    fn account_summary(&self) -> Result<AccountSummary> {
        Ok(self
            .iam("account_summary")?
            .map(|a| a.iam.summary.clone())
            .unwrap_or_default())
    }
}
