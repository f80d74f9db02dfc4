//! EBS snapshot checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct OldSnapshotsCheck;

impl OldSnapshotsCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "snapshots.old_snapshots",
        service: "snapshots",
        name: "Old snapshots",
        description: "Snapshots older than old_snapshot_days",
        kind: CheckKind::Cost,
        severity: Severity::Medium,
        global: false,
        remediation: "Delete snapshots no longer covered by the retention policy",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let max_age = ctx.params().days("old_snapshot_days", 30) as i64;
        let snapshots = session.api().list_snapshots()?;

        let mut findings = Vec::new();
        for snapshot in ctx.included(&snapshots) {
            let age = ctx.days_since(snapshot.start_time);
            if age <= max_age {
                continue;
            }
            let mut finding = ctx
                .finding(self, snapshot, format!("Snapshot is {} days old", age))
                .with_remediation(Self::DEFINITION.remediation)
                .with_detail("age_days", age)
                .with_detail("size_gib", snapshot.size_gib);
            if let Some(volume) = &snapshot.volume_id {
                finding = finding.with_detail("volume_id", volume.as_str());
            }
            findings.push(finding);
        }
        Ok(findings)
    }
}

audit_check!(OldSnapshotsCheck);
