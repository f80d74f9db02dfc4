//! Load balancer checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct NoHealthyTargetsCheck;

impl NoHealthyTargetsCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "lb.no_healthy_targets",
        service: "lb",
        name: "Load balancers without healthy targets",
        description: "Load balancers where no target group has a healthy target",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Delete the load balancer or fix the targets behind it",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let balancers = session.api().list_load_balancers()?;

        Ok(ctx
            .included(&balancers)
            .into_iter()
            .filter(|lb| lb.healthy_targets() == 0)
            .map(|lb| {
                let title = if lb.target_groups.is_empty() {
                    "No target groups attached".to_string()
                } else {
                    format!("No healthy targets in {} target groups", lb.target_groups.len())
                };
                ctx.finding(self, lb, title)
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("type", lb.lb_type.as_str())
                    .with_detail("scheme", lb.scheme.as_str())
                    .with_detail("target_groups", lb.target_groups.len())
            })
            .collect())
    }
}

audit_check!(NoHealthyTargetsCheck);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use skyaudit_core::{AuditCheck, LoadBalancer, TargetGroup};

    fn balancer(name: &str, groups: &[(u32, u32)]) -> LoadBalancer {
        LoadBalancer {
            name: name.into(),
            lb_type: "application".into(),
            scheme: "internet-facing".into(),
            target_groups: groups
                .iter()
                .enumerate()
                .map(|(i, (healthy, unhealthy))| TargetGroup {
                    name: format!("{}-tg{}", name, i),
                    healthy_targets: *healthy,
                    unhealthy_targets: *unhealthy,
                })
                .collect(),
            tags: Default::default(),
        }
    }

    #[test]
    fn test_no_healthy_targets() {
        let api = FakeApi {
            load_balancers: vec![
                balancer("serving", &[(0, 1), (2, 0)]),
                balancer("broken", &[(0, 3)]),
                balancer("empty", &[]),
            ],
            ..Default::default()
        };
        let session = session(api);
        let ctx = context("lb.no_healthy_targets");

        let findings = NoHealthyTargetsCheck.execute(&session, &ctx).unwrap();
        let names: Vec<_> = findings
            .iter()
            .map(|f| f.details["resource_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["broken", "empty"]);
        assert_eq!(findings[1].title, "No target groups attached");
        assert_eq!(findings[0].details["target_groups"], 1);
    }
}
