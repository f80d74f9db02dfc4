//! Backup vault checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

/// Vault every account gets; never reported
const DEFAULT_VAULT: &str = "default";

pub struct EmptyVaultsCheck;

impl EmptyVaultsCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "backup.empty_vaults",
        service: "backup",
        name: "Empty backup vaults",
        description: "Backup vaults other than the default one holding no recovery points",
        kind: CheckKind::Cost,
        severity: Severity::Low,
        global: false,
        remediation: "Delete the vault or attach a backup plan to it",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let vaults = session.api().list_backup_vaults()?;

        Ok(ctx
            .included(&vaults)
            .into_iter()
            .filter(|v| v.name != DEFAULT_VAULT && v.recovery_points == 0)
            .map(|v| {
                let mut finding = ctx
                    .finding(self, v, "Backup vault holds no recovery points")
                    .with_remediation(Self::DEFINITION.remediation);
                if let Some(created) = v.created {
                    finding = finding.with_detail("created", created.to_rfc3339());
                }
                finding
            })
            .collect())
    }
}

audit_check!(EmptyVaultsCheck);
