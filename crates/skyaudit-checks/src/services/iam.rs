//! IAM checks
//!
//! IAM is a global service: these checks are scheduled once per account.

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{
    AuditCheck, CheckKind, ExecutionContext, Finding, Result, Session, Severity,
};

pub struct RootAccessKeysCheck;

impl RootAccessKeysCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "iam.root_access_keys",
        service: "iam",
        name: "Root account access keys",
        description: "The root user has active access keys",
        kind: CheckKind::Security,
        severity: Severity::Critical,
        global: true,
        remediation: "Delete the root access keys and use IAM roles instead",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let summary = session.api().account_summary()?;
        if !summary.root_access_keys_present {
            return Ok(Vec::new());
        }

        let root_arn = format!("arn:aws:iam::{}:root", ctx.account_id());
        if ctx.exclusions().excludes_arn(&root_arn) {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::new(
            ctx.account_id(),
            ctx.region(),
            self.service(),
            self.id(),
            self.kind(),
            self.severity(),
            root_arn,
            "Root user has access keys",
        )
        .with_remediation(Self::DEFINITION.remediation)
        .with_detail("root_mfa_enabled", summary.root_mfa_enabled)])
    }
}

audit_check!(RootAccessKeysCheck);

pub struct OldAccessKeysCheck;

impl OldAccessKeysCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "iam.old_access_keys",
        service: "iam",
        name: "Old access keys",
        description: "Active access keys older than access_key_age_days",
        kind: CheckKind::Security,
        severity: Severity::High,
        global: true,
        remediation: "Rotate the access key",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let max_age = ctx.params().days("access_key_age_days", 90) as i64;
        let keys = session.api().list_access_keys()?;

        let mut findings = Vec::new();
        for key in ctx.included(&keys) {
            if !key.is_active() {
                continue;
            }
            let age = ctx.days_since(key.created);
            if age > max_age {
                findings.push(
                    ctx.finding(self, key, format!("Access key {} is {} days old", key.key_id, age))
                        .with_remediation(Self::DEFINITION.remediation)
                        .with_detail("user_name", key.user_name.as_str())
                        .with_detail("age_days", age),
                );
            }
        }
        Ok(findings)
    }
}

audit_check!(OldAccessKeysCheck);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use skyaudit_core::{AccessKey, AccountSummary};

    fn key(user: &str, id: &str, status: &str, age_days: i64) -> AccessKey {
        AccessKey {
            user_name: user.into(),
            key_id: id.into(),
            status: status.into(),
            created: days_ago(age_days),
            tags: Default::default(),
        }
    }

    #[test]
    fn test_root_access_keys() {
        let api = FakeApi {
            summary: AccountSummary {
                root_access_keys_present: true,
                root_mfa_enabled: false,
            },
            ..Default::default()
        };
        let session = session(api);
        let ctx = context("iam.root_access_keys");

        let findings = RootAccessKeysCheck.execute(&session, &ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "arn:aws:iam::123456789012:root");
        assert_eq!(findings[0].details["root_mfa_enabled"], false);
    }

    #[test]
    fn test_no_root_keys() {
        let session = session(FakeApi::default());
        let ctx = context("iam.root_access_keys");
        assert!(RootAccessKeysCheck.execute(&session, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_old_access_keys() {
        let api = FakeApi {
            access_keys: vec![
                key("alice", "AKIAOLD", "Active", 200),
                key("bob", "AKIAINACTIVE", "Inactive", 400),
                key("carol", "AKIANEW", "Active", 10),
            ],
            ..Default::default()
        };
        let session = session(api);
        let ctx = context("iam.old_access_keys");

        let findings = OldAccessKeysCheck.execute(&session, &ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].details["user_name"], "alice");
        assert_eq!(findings[0].details["resource_name"], "AKIAOLD");
    }
}
