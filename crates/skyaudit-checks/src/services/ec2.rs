//! EC2 instance checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{
    CheckKind, ExecutionContext, Finding, InstanceState, Result, Session, Severity,
};
use tracing::debug;

pub struct StoppedInstancesCheck;

impl StoppedInstancesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "ec2.stopped_instances",
        service: "ec2",
        name: "Long-stopped instances",
        description: "Instances stopped longer than stopped_days still pay for attached storage",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Terminate the instance or create an AMI and remove it",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let min_days = ctx.params().days("stopped_days", 7) as i64;
        let instances = session.api().list_instances()?;

        let mut findings = Vec::new();
        for instance in ctx.included(&instances) {
            if instance.state != InstanceState::Stopped {
                continue;
            }
            // State change time unknown: cannot tell how long it has been stopped
            let Some(since) = instance.state_since else {
                continue;
            };
            let days = ctx.days_since(since);
            if days >= min_days {
                findings.push(
                    ctx.finding(self, instance, format!("Instance stopped for {} days", days))
                        .with_remediation(Self::DEFINITION.remediation)
                        .with_detail("instance_type", instance.instance_type.as_str())
                        .with_detail("days_stopped", days),
                );
            }
        }
        Ok(findings)
    }
}

audit_check!(StoppedInstancesCheck);

pub struct IdleInstancesCheck;

impl IdleInstancesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "ec2.idle_instances",
        service: "ec2",
        name: "Idle running instances",
        description: "Running instances whose average CPU stays below ec2_cpu over idle_days",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Downsize the instance type or stop the instance",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let threshold = ctx.params().threshold("ec2_cpu", 20.0);
        let days = ctx.params().days("idle_days", 7);
        let instances = session.api().list_instances()?;

        let mut findings = Vec::new();
        for instance in ctx.included(&instances) {
            if instance.state != InstanceState::Running {
                continue;
            }
            let Some(cpu) = session.api().instance_cpu_average(&instance.id, days)? else {
                debug!("No CPU datapoints for {}", instance.id);
                continue;
            };
            if cpu < threshold {
                findings.push(
                    ctx.finding(
                        self,
                        instance,
                        format!("Average CPU {:.1}% over {} days", cpu, days),
                    )
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("instance_type", instance.instance_type.as_str())
                    .with_detail("cpu_average", cpu)
                    .with_detail("threshold", threshold),
                );
            }
        }
        Ok(findings)
    }
}

audit_check!(IdleInstancesCheck);
