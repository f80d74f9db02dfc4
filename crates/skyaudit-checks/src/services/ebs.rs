//! EBS volume checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct OrphanVolumesCheck;

impl OrphanVolumesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "ebs.orphan_volumes",
        service: "ebs",
        name: "Orphaned volumes",
        description: "Volumes in the available state are not attached to any instance",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Snapshot the volume if needed, then delete it",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let volumes = session.api().list_volumes()?;

        Ok(ctx
            .included(&volumes)
            .into_iter()
            .filter(|v| v.state == "available")
            .map(|v| {
                let title = format!("Unattached {} GiB {} volume", v.size_gib, v.volume_type);
                ctx.finding(self, v, title)
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("size_gib", v.size_gib)
                    .with_detail("volume_type", v.volume_type.as_str())
            })
            .collect())
    }
}

audit_check!(OrphanVolumesCheck);

pub struct UnencryptedVolumesCheck;

impl UnencryptedVolumesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "ebs.unencrypted_volumes",
        service: "ebs",
        name: "Unencrypted volumes",
        description: "Volumes without encryption at rest",
        kind: CheckKind::Security,
        severity: Severity::Medium,
        global: false,
        remediation: "Copy the data to an encrypted volume and enable EBS encryption by default",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let volumes = session.api().list_volumes()?;

        Ok(ctx
            .included(&volumes)
            .into_iter()
            .filter(|v| !v.encrypted)
            .map(|v| {
                ctx.finding(self, v, "Volume is not encrypted")
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("state", v.state.as_str())
            })
            .collect())
    }
}

audit_check!(UnencryptedVolumesCheck);
