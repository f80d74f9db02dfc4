//! CloudWatch checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct UnusedAlarmsCheck;

impl UnusedAlarmsCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "cloudwatch.unused_alarms",
        service: "cloudwatch",
        name: "Unused alarms",
        description: "Alarms whose state has not changed in alarm_stale_days",
        kind: CheckKind::Cost,
        severity: Severity::Low,
        global: false,
        remediation: "Delete the alarm or point it at a metric that still reports",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let max_age = ctx.params().days("alarm_stale_days", 30) as i64;
        let alarms = session.api().list_alarms()?;

        let mut findings = Vec::new();
        for alarm in ctx.included(&alarms) {
            // alarms that never transitioned carry no timestamp
            let Some(updated) = alarm.state_updated else {
                continue;
            };
            let age = ctx.days_since(updated);
            if age <= max_age {
                continue;
            }
            let mut finding = ctx
                .finding(self, alarm, format!("No state change in {} days", age))
                .with_remediation(Self::DEFINITION.remediation)
                .with_detail("state_value", alarm.state_value.as_str())
                .with_detail("state_updated", updated.to_rfc3339());
            if let Some(metric) = &alarm.metric_name {
                finding = finding.with_detail("metric_name", metric.as_str());
            }
            findings.push(finding);
        }
        Ok(findings)
    }
}

audit_check!(UnusedAlarmsCheck);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use skyaudit_core::{Alarm, AuditCheck};
    use std::collections::BTreeMap;

    fn alarm(name: &str, updated_days_ago: Option<i64>) -> Alarm {
        Alarm {
            name: name.into(),
            state_value: "OK".into(),
            state_updated: updated_days_ago.map(days_ago),
            metric_name: Some("CPUUtilization".into()),
            tags: Default::default(),
        }
    }

    fn api() -> FakeApi {
        FakeApi {
            alarms: vec![
                alarm("stale", Some(120)),
                alarm("recent", Some(3)),
                alarm("edge", Some(30)),
                alarm("never", None),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_unused_alarms_default_age() {
        let session = session(api());
        let ctx = context("cloudwatch.unused_alarms");

        let findings = UnusedAlarmsCheck.execute(&session, &ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].details["resource_name"], "stale");
        assert_eq!(findings[0].details["metric_name"], "CPUUtilization");
        assert_eq!(findings[0].title, "No state change in 120 days");
    }

    #[test]
    fn test_unused_alarms_threshold_override() {
        let session = session(api());
        let thresholds = BTreeMap::from([("alarm_stale_days".to_string(), 2.0)]);
        let ctx = context_with(
            "cloudwatch.unused_alarms",
            skyaudit_core::ExclusionContext::empty(),
            thresholds,
        );

        let findings = UnusedAlarmsCheck.execute(&session, &ctx).unwrap();
        assert_eq!(findings.len(), 3);
    }
}
