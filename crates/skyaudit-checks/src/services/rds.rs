//! RDS database checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct IdleInstancesCheck;

impl IdleInstancesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "rds.idle_instances",
        service: "rds",
        name: "Idle database instances",
        description: "Database instances whose average CPU stays below rds_cpu over idle_days",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Downsize the instance class or stop the database",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let threshold = ctx.params().threshold("rds_cpu", 20.0);
        let days = ctx.params().days("idle_days", 7);
        let databases = session.api().list_db_instances()?;

        let mut findings = Vec::new();
        for db in ctx.included(&databases) {
            let Some(cpu) = session.api().db_cpu_average(&db.id, days)? else {
                continue;
            };
            if cpu < threshold {
                findings.push(
                    ctx.finding(self, db, format!("Average CPU {:.1}% over {} days", cpu, days))
                        .with_remediation(Self::DEFINITION.remediation)
                        .with_detail("instance_class", db.instance_class.as_str())
                        .with_detail("engine", db.engine.as_str())
                        .with_detail("cpu_average", cpu),
                );
            }
        }
        Ok(findings)
    }
}

audit_check!(IdleInstancesCheck);

pub struct PublicInstancesCheck;

impl PublicInstancesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "rds.public_instances",
        service: "rds",
        name: "Publicly accessible databases",
        description: "Database instances reachable from the internet",
        kind: CheckKind::Security,
        severity: Severity::Critical,
        global: false,
        remediation: "Disable public accessibility and move the instance to private subnets",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let databases = session.api().list_db_instances()?;

        Ok(ctx
            .included(&databases)
            .into_iter()
            .filter(|db| db.publicly_accessible)
            .map(|db| {
                ctx.finding(self, db, "Database is publicly accessible")
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("engine", db.engine.as_str())
            })
            .collect())
    }
}

audit_check!(PublicInstancesCheck);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use skyaudit_core::{AuditCheck, DbInstance};

    fn db(id: &str, public: bool) -> DbInstance {
        DbInstance {
            id: id.into(),
            instance_class: "db.t3.medium".into(),
            engine: "postgres".into(),
            publicly_accessible: public,
            tags: Default::default(),
        }
    }

    fn api() -> FakeApi {
        FakeApi {
            db_instances: vec![db("db-idle", true), db("db-busy", false)],
            cpu: [("db-idle".to_string(), 1.5), ("db-busy".to_string(), 60.0)].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_databases() {
        let session = session(api());
        let ctx = context("rds.idle_instances");

        let findings = IdleInstancesCheck.execute(&session, &ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "arn:aws:rds:us-east-1:123456789012:db:db-idle");
    }

    #[test]
    fn test_public_databases() {
        let session = session(api());
        let ctx = context("rds.public_instances");

        let findings = PublicInstancesCheck.execute(&session, &ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, CheckKind::Security);
    }
}
