//! Inventory snapshot model
//!
//! An inventory describes everything the provider can answer: the caller's
//! identity, the organization, per-account roles, per-region resources and
//! metrics, simulated latency, and injected faults.

use skyaudit_core::{
    AccessKey, Account, AccountSummary, Address, Alarm, AuditError, BackupVault, Bucket,
    DbInstance, FailureKind, Function, Instance, LoadBalancer, NatGateway, Result,
    SecurityGroup, Snapshot, Volume,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default organization listing page size
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Complete inventory document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Identity of the ambient credentials
    pub caller: CallerIdentity,

    /// Organization, absent when the caller is standalone
    #[serde(default)]
    pub organization: Option<OrganizationInventory>,

    /// Per-account data keyed by account id
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountInventory>,

    /// Simulated per-call latency by region, in milliseconds
    #[serde(default)]
    pub latency_ms: BTreeMap<String, u64>,

    /// Injected failures
    #[serde(default)]
    pub faults: Vec<Fault>,
}

/// Ambient identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account_id: String,
    #[serde(default = "default_access_key")]
    pub access_key_id: String,
}

fn default_access_key() -> String {
    "AKIAINVENTORY".to_string()
}

/// Organization description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationInventory {
    pub id: String,
    pub management_account_id: String,

    /// Accounts besides the management account allowed to list the organization
    #[serde(default)]
    pub delegated_admins: Vec<String>,

    /// Accounts returned per listing page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Member accounts, in listing order
    #[serde(default)]
    pub accounts: Vec<Account>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl OrganizationInventory {
    /// Whether `account_id` may call organization APIs
    pub fn can_list(&self, account_id: &str) -> bool {
        self.management_account_id == account_id
            || self.delegated_admins.iter().any(|a| a == account_id)
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|a| a.id == account_id)
    }
}

/// Role that can be assumed in an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInventory {
    pub name: String,

    /// Accounts trusted to assume the role. When empty the organization's
    /// management account and delegated admins are trusted.
    #[serde(default)]
    pub trusted_accounts: Vec<String>,
}

/// Account-level IAM data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IamInventory {
    #[serde(default)]
    pub access_keys: Vec<AccessKey>,
    #[serde(default)]
    pub summary: AccountSummary,
}

/// Everything known about one account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInventory {
    #[serde(default)]
    pub roles: Vec<RoleInventory>,

    #[serde(default)]
    pub iam: IamInventory,

    /// Regional resources keyed by region
    #[serde(default)]
    pub regions: BTreeMap<String, RegionInventory>,
}

impl AccountInventory {
    pub fn role(&self, name: &str) -> Option<&RoleInventory> {
        self.roles.iter().find(|r| r.name == name)
    }
}

/// Resources and metrics of one account in one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionInventory {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub db_instances: Vec<DbInstance>,
    #[serde(default)]
    pub nat_gateways: Vec<NatGateway>,
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancer>,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    #[serde(default)]
    pub backup_vaults: Vec<BackupVault>,

    /// Average CPU by instance or database id
    #[serde(default)]
    pub cpu_average: BTreeMap<String, f64>,

    /// Invocation totals by function name
    #[serde(default)]
    pub invocations: BTreeMap<String, u64>,

    /// Bytes sent to destinations by NAT gateway id
    #[serde(default)]
    pub nat_bytes_out: BTreeMap<String, u64>,
}

/// A rule that makes matching calls fail
///
/// Unset fields match anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    pub kind: FailureKind,

    /// Fail only the first `times` matching calls
    #[serde(default)]
    pub times: Option<u32>,

    #[serde(default)]
    pub message: Option<String>,
}

impl Fault {
    pub fn matches(&self, call: &Call<'_>) -> bool {
        fn field(expected: &Option<String>, actual: Option<&str>) -> bool {
            match expected {
                None => true,
                Some(expected) => actual == Some(expected.as_str()),
            }
        }

        field(&self.account, call.account)
            && field(&self.region, call.region)
            && field(&self.service, call.service)
            && field(&self.operation, Some(call.operation))
    }

    pub fn to_error(&self, call: &Call<'_>) -> AuditError {
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("injected {} on {}", self.kind, call.operation));
        AuditError::cloud(self.kind, message)
    }
}

/// Coordinates of one provider call, used for fault matching
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub account: Option<&'a str>,
    pub region: Option<&'a str>,
    pub service: Option<&'a str>,
    pub operation: &'a str,
}

impl Inventory {
    /// Load an inventory from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let inventory: Inventory = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content).map_err(|e| AuditError::Parse {
                context: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| AuditError::Parse {
                context: path.display().to_string(),
                message: e.to_string(),
            })?
        };

        inventory.validate()?;
        Ok(inventory)
    }

    /// Parse YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let inventory: Inventory = serde_yaml::from_str(content).map_err(|e| AuditError::Parse {
            context: "inventory".to_string(),
            message: e.to_string(),
        })?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// Reject documents the provider cannot serve
    pub fn validate(&self) -> Result<()> {
        if self.caller.account_id.is_empty() {
            return Err(AuditError::Config(
                "inventory: caller.account_id is required".to_string(),
            ));
        }
        if let Some(org) = &self.organization {
            if org.page_size == 0 {
                return Err(AuditError::Config(
                    "inventory: organization.page_size must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether the account is known at all
    pub fn account_exists(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
            || self
                .organization
                .as_ref()
                .map(|o| o.contains(account_id))
                .unwrap_or(false)
    }

    /// Builder helper: add or replace an account
    pub fn with_account(
        mut self,
        account_id: impl Into<String>,
        account: AccountInventory,
    ) -> Self {
        self.accounts.insert(account_id.into(), account);
        self
    }

    /// Builder helper: add a fault
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }
}
