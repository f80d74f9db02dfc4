//! End-to-end runs of the orchestrator against in-memory inventories

use chrono::{TimeZone, Utc};
use skyaudit_checks::default_registry;
use skyaudit_core::{
    Account, AccountStatus, AuditCheck, Bucket, CheckKind, CloudProvider, Config, ConfigFile,
    ErrorStage, ExecutionContext, FailureKind, Finding, ProgressReporter, RunResult, Session,
    Settings, Severity, Volume, WorkItemId,
};
use skyaudit_engine::AuditRunner;
use skyaudit_provider::{
    AccountInventory, Fault, Inventory, InventoryProvider, OrganizationInventory, RegionInventory,
    RoleInventory,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MANAGEMENT: &str = "111111111111";
const MEMBER_A: &str = "222222222222";
const MEMBER_B: &str = "333333333333";

fn as_of() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn volume(id: &str, tags: &[(&str, &str)]) -> Volume {
    Volume {
        id: id.into(),
        volume_type: "gp2".into(),
        size_gib: 20,
        state: "available".into(),
        encrypted: true,
        tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
}

fn member(regions: Vec<(&str, RegionInventory)>) -> AccountInventory {
    AccountInventory {
        roles: vec![RoleInventory {
            name: "OrganizationAccountAccessRole".into(),
            trusted_accounts: Vec::new(),
        }],
        regions: regions
            .into_iter()
            .map(|(name, region)| (name.to_string(), region))
            .collect(),
        ..Default::default()
    }
}

fn volumes(ids: &[&str]) -> RegionInventory {
    RegionInventory {
        volumes: ids.iter().map(|id| volume(id, &[])).collect(),
        ..Default::default()
    }
}

/// Management account plus two active members, each with one orphaned
/// volume per region
fn organization() -> Inventory {
    let mut inventory = Inventory {
        organization: Some(OrganizationInventory {
            id: "o-example".into(),
            management_account_id: MANAGEMENT.into(),
            delegated_admins: Vec::new(),
            page_size: 20,
            accounts: vec![
                Account::active(MANAGEMENT),
                Account::active(MEMBER_A),
                Account::active(MEMBER_B),
            ],
        }),
        ..Default::default()
    };
    inventory.caller.account_id = MANAGEMENT.into();

    inventory
        .with_account(
            MEMBER_A,
            member(vec![
                ("us-east-1", volumes(&["vol-a-use1"])),
                ("eu-west-1", volumes(&["vol-a-euw1"])),
            ]),
        )
        .with_account(
            MEMBER_B,
            member(vec![
                ("us-east-1", volumes(&["vol-b-use1"])),
                ("eu-west-1", volumes(&["vol-b-euw1"])),
            ]),
        )
}

fn org_settings(regions: &[&str]) -> Settings {
    Settings {
        organization: true,
        regions: strings(regions),
        max_workers: 4,
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    }
}

fn run(
    inventory: Inventory,
    settings: Settings,
    checks: &[&str],
) -> skyaudit_core::Result<RunResult> {
    let checks = default_registry().select(&strings(checks))?;
    run_checks(inventory, settings, checks)
}

fn run_checks(
    inventory: Inventory,
    settings: Settings,
    checks: Vec<Arc<dyn AuditCheck>>,
) -> skyaudit_core::Result<RunResult> {
    let provider: Arc<dyn CloudProvider> = Arc::new(InventoryProvider::new(inventory));
    AuditRunner::new(provider, settings)
        .with_checks(checks)
        .with_as_of(as_of())
        .run()
}

fn resource_names(findings: &[Finding]) -> Vec<String> {
    findings
        .iter()
        .map(|f| f.details["resource_name"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn enumeration_returns_every_account_beyond_one_page() {
    let mut inventory = organization();
    if let Some(org) = inventory.organization.as_mut() {
        for i in 0..60u64 {
            org.accounts.push(Account::active(format!("{:012}", 500000000000 + i)));
        }
        org.accounts.push(Account {
            id: "999999999999".into(),
            status: AccountStatus::Suspended,
            name: None,
        });
    }

    let result = run(inventory, org_settings(&["us-east-1"]), &["ebs.orphan_volumes"]).unwrap();

    assert_eq!(result.summary.accounts_requested, 63);
    assert_eq!(result.summary.accounts_inactive, 1);
    assert_eq!(result.summary.work_items_total, 63);
}

#[test]
fn fan_out_schedules_unique_work_items() {
    let inventory = organization();
    let mut settings = org_settings(&["us-east-1", "eu-west-1", "ap-south-1"]);
    settings.exclude.accounts = vec![MANAGEMENT.into()];

    let result = run(
        inventory,
        settings,
        &["ebs.orphan_volumes", "ebs.unencrypted_volumes", "eip.unattached", "ec2.idle_instances"],
    )
    .unwrap();

    assert_eq!(result.summary.work_items_total, 24);
    assert_eq!(result.summary.work_items_succeeded, 24);
    assert_eq!(result.summary.accounts_excluded, 1);
    assert_eq!(result.summary.accounts_requested, 2);
    assert_eq!(result.summary.regions_scanned, 3);
}

#[test]
fn global_and_profile_exclusions_are_both_active() {
    let config = ConfigFile::from_yaml(
        r#"
exclude:
  tags:
    - { key: Environment, value: production }
profiles:
  customer01:
    exclude:
      tags:
        - { key: Customer, value: customer01-protected }
"#,
        "test",
    )
    .unwrap();
    let mut settings = Config::from_config_file(config).settings("customer01").unwrap();
    settings.organization = true;

    let mut inventory = organization();
    let region = RegionInventory {
        buckets: vec![
            Bucket {
                name: "prod-bucket".into(),
                public_read: true,
                encrypted: true,
                tags: [("Environment".to_string(), "production".to_string())].into(),
            },
            Bucket {
                name: "customer-bucket".into(),
                public_read: true,
                encrypted: true,
                tags: [("Customer".to_string(), "customer01-protected".to_string())].into(),
            },
            Bucket {
                name: "open-bucket".into(),
                public_read: true,
                encrypted: true,
                tags: [("Environment".to_string(), "Production".to_string())].into(),
            },
        ],
        ..Default::default()
    };
    inventory = inventory.with_account(MEMBER_A, member(vec![("us-east-1", region)]));

    let result = run(inventory, settings, &["s3.public_read"]).unwrap();

    assert_eq!(resource_names(&result.findings), vec!["open-bucket"]);
    assert_eq!(result.summary.resources_excluded, 2);
}

#[test]
fn repeated_runs_are_identical() {
    let settings = org_settings(&["us-east-1", "eu-west-1"]);
    let checks = ["ebs.orphan_volumes", "ebs.unencrypted_volumes"];

    let first = run(organization(), settings.clone(), &checks).unwrap();
    let second = run(organization(), settings, &checks).unwrap();

    assert!(!first.findings.is_empty());
    assert_eq!(first.findings, second.findings);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn findings_follow_presentation_order() {
    let settings = org_settings(&["us-east-1", "eu-west-1"]);
    let result = run(organization(), settings, &["ebs.orphan_volumes"]).unwrap();

    assert_eq!(
        resource_names(&result.findings),
        vec!["vol-a-euw1", "vol-a-use1", "vol-b-euw1", "vol-b-use1"]
    );
}

#[test]
fn one_failing_item_leaves_the_others_intact() {
    let inventory = organization().with_fault(Fault {
        account: Some(MEMBER_B.into()),
        region: Some("eu-west-1".into()),
        service: Some("ebs".into()),
        operation: None,
        kind: FailureKind::AccessDenied,
        times: None,
        message: Some("ebs:DescribeVolumes denied".into()),
    });

    let settings = org_settings(&["us-east-1", "eu-west-1"]);
    let result = run(inventory, settings, &["ebs.orphan_volumes"]).unwrap();

    assert_eq!(result.summary.work_items_total, 6);
    assert_eq!(result.summary.work_items_succeeded, 5);
    assert_eq!(result.errors.len(), 1);

    let error = &result.errors[0];
    assert_eq!(error.item, WorkItemId::new(MEMBER_B, "eu-west-1", "ebs.orphan_volumes"));
    assert_eq!(error.kind, FailureKind::AccessDenied);
    assert_eq!(error.stage, ErrorStage::Check);
    assert_eq!(
        resource_names(&result.findings),
        vec!["vol-a-euw1", "vol-a-use1", "vol-b-use1"]
    );
    assert_eq!(result.status().exit_code(), 2);
}

#[test]
fn credential_failure_is_recorded_per_account() {
    let mut inventory = organization();
    if let Some(account) = inventory.accounts.get_mut(MEMBER_B) {
        account.roles.clear();
    }

    let checks = ["ebs.orphan_volumes", "eip.unattached"];
    let result = run(inventory, org_settings(&["us-east-1"]), &checks).unwrap();

    assert_eq!(result.errors.len(), 2);
    for error in &result.errors {
        assert_eq!(error.item.account_id, MEMBER_B);
        assert_eq!(error.kind, FailureKind::RoleNotFound);
        assert_eq!(error.stage, ErrorStage::Credentials);
        assert!(error.hint.contains("cross_account_role"));
    }
    assert_eq!(resource_names(&result.findings), vec!["vol-a-use1"]);
}

#[test]
fn throttled_role_assumption_recovers() {
    let inventory = organization().with_fault(Fault {
        account: Some(MEMBER_A.into()),
        region: None,
        service: None,
        operation: Some("assume_role".into()),
        kind: FailureKind::Throttled,
        times: Some(2),
        message: None,
    });

    let result = run(inventory, org_settings(&["us-east-1"]), &["ebs.orphan_volumes"]).unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(resource_names(&result.findings), vec!["vol-a-use1", "vol-b-use1"]);
}

#[test]
fn single_account_scan_never_assumes_the_admin_account() {
    let mut inventory = organization().with_account(
        MANAGEMENT,
        AccountInventory {
            regions: [("us-east-1".to_string(), volumes(&["vol-mgmt"]))].into(),
            ..Default::default()
        },
    );
    if let Some(account) = inventory.accounts.get_mut(MEMBER_A) {
        account.roles.clear();
    }
    let settings = Settings {
        regions: strings(&["us-east-1"]),
        org_admin_account_id: Some(MEMBER_A.into()),
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    };

    let result = run(inventory, settings, &["ebs.orphan_volumes"]).unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(result.summary.accounts_scanned, 1);
    assert_eq!(resource_names(&result.findings), vec!["vol-mgmt"]);
    assert!(result.findings.iter().all(|f| f.account_id == MANAGEMENT));
}

struct ExplodingCheck;

impl AuditCheck for ExplodingCheck {
    fn id(&self) -> &str {
        "ebs.boom"
    }

    fn service(&self) -> &str {
        "ebs"
    }

    fn name(&self) -> &str {
        "Exploding check"
    }

    fn description(&self) -> &str {
        "Panics for one member account in one region"
    }

    fn kind(&self) -> CheckKind {
        CheckKind::Cost
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn execute(
        &self,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> skyaudit_core::Result<Vec<Finding>> {
        if ctx.account_id() == MEMBER_B && ctx.region() == "us-east-1" {
            panic!("kaboom");
        }
        session.api().list_volumes()?;
        Ok(Vec::new())
    }
}

#[test]
fn panicking_check_becomes_one_error_record() {
    let settings = org_settings(&["us-east-1", "eu-west-1"]);
    let check: Arc<dyn AuditCheck> = Arc::new(ExplodingCheck);
    let result = run_checks(organization(), settings, vec![check]).unwrap();

    assert_eq!(result.summary.work_items_total, 6);
    assert_eq!(result.summary.work_items_succeeded, 5);
    assert_eq!(result.summary.work_items_failed, 1);
    assert_eq!(result.errors.len(), 1);

    let error = &result.errors[0];
    assert_eq!(error.item, WorkItemId::new(MEMBER_B, "us-east-1", "ebs.boom"));
    assert_eq!(error.kind, FailureKind::Unknown);
    assert_eq!(error.stage, ErrorStage::Check);
    assert!(error.message.starts_with("panic: kaboom"));
    assert_eq!(result.status().exit_code(), 2);
}

#[derive(Default)]
struct CountingReporter {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ProgressReporter for CountingReporter {
    fn run_started(&self, _total_items: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn item_finished(
        &self,
        _item: &WorkItemId,
        _succeeded: bool,
        _completed: usize,
        _total: usize,
    ) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn finding_discovered(&self, _finding: &Finding) {}

    fn error(&self, _item: &WorkItemId, _message: &str) {}
}

#[test]
fn organization_access_failure_schedules_nothing() {
    let mut inventory = organization();
    inventory.organization = None;
    let provider = Arc::new(InventoryProvider::new(inventory));
    let reporter = Arc::new(CountingReporter::default());

    let err = AuditRunner::new(provider.clone(), org_settings(&["us-east-1", "eu-west-1"]))
        .with_checks(default_registry().checks().to_vec())
        .with_progress(reporter.clone())
        .run()
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::NotInOrganization);
    assert!(err.to_string().contains(MANAGEMENT));
    assert_eq!(reporter.started.load(Ordering::SeqCst), 0);
    assert_eq!(reporter.finished.load(Ordering::SeqCst), 0);
    // identity lookup and describe_organization, nothing else
    assert_eq!(provider.call_count(), 2);
}

#[test]
fn concurrent_items_never_see_other_accounts() {
    let mut settings = org_settings(&["us-east-1", "eu-west-1"]);
    settings.max_workers = 8;

    for _ in 0..5 {
        let checks = ["ebs.orphan_volumes", "ebs.unencrypted_volumes"];
        let result = run(organization(), settings.clone(), &checks).unwrap();
        for finding in &result.findings {
            let name = finding.details["resource_name"].as_str().unwrap_or_default();
            let expected = match finding.account_id.as_str() {
                MEMBER_A => "vol-a-",
                MEMBER_B => "vol-b-",
                other => panic!("unexpected account {}", other),
            };
            assert!(name.starts_with(expected), "{} reported under {}", name, finding.account_id);
            assert!(finding.resource_id.contains(&finding.account_id));
        }
    }
}

#[test]
fn slow_region_times_out_without_blocking_others() {
    let mut inventory = organization();
    inventory.latency_ms.insert("eu-west-1".into(), 200);
    let mut settings = org_settings(&["us-east-1", "eu-west-1"]);
    settings.api_timeout = Duration::from_millis(20);

    let result = run(inventory, settings, &["ebs.orphan_volumes"]).unwrap();

    let timed_out: HashSet<_> = result
        .errors
        .iter()
        .filter(|e| e.kind == FailureKind::Timeout)
        .map(|e| e.item.region.as_str())
        .collect();
    assert_eq!(timed_out, HashSet::from(["eu-west-1"]));
    assert_eq!(result.summary.work_items_succeeded, 3);
    assert_eq!(resource_names(&result.findings), vec!["vol-a-use1", "vol-b-use1"]);
}
