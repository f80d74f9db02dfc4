//! S3 bucket checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct PublicReadCheck;

impl PublicReadCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "s3.public_read",
        service: "s3",
        name: "Publicly readable buckets",
        description: "Buckets whose ACL or policy grants read access to everyone",
        kind: CheckKind::Security,
        severity: Severity::Critical,
        global: false,
        remediation: "Enable S3 Block Public Access and remove public grants",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let buckets = session.api().list_buckets()?;

        Ok(ctx
            .included(&buckets)
            .into_iter()
            .filter(|b| b.public_read)
            .map(|b| {
                ctx.finding(self, b, format!("Bucket {} is publicly readable", b.name))
                    .with_remediation(Self::DEFINITION.remediation)
            })
            .collect())
    }
}

audit_check!(PublicReadCheck);

pub struct UnencryptedBucketsCheck;

impl UnencryptedBucketsCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "s3.unencrypted",
        service: "s3",
        name: "Buckets without default encryption",
        description: "Buckets with no default server-side encryption",
        kind: CheckKind::Security,
        severity: Severity::Medium,
        global: false,
        remediation: "Enable default SSE-S3 or SSE-KMS encryption",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let buckets = session.api().list_buckets()?;

        Ok(ctx
            .included(&buckets)
            .into_iter()
            .filter(|b| !b.encrypted)
            .map(|b| {
                ctx.finding(self, b, format!("Bucket {} has no default encryption", b.name))
                    .with_remediation(Self::DEFINITION.remediation)
            })
            .collect())
    }
}

audit_check!(UnencryptedBucketsCheck);
