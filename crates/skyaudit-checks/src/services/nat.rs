//! NAT gateway checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

const MIB: f64 = 1024.0 * 1024.0;

pub struct UnusedGatewaysCheck;

impl UnusedGatewaysCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "nat.unused_gateways",
        service: "nat",
        name: "Unused NAT gateways",
        description: "Available gateways that sent less than nat_min_mb over nat_idle_days",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Delete the gateway or route the subnets through a shared one",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let days = ctx.params().days("nat_idle_days", 7);
        let min_mb = ctx.params().threshold("nat_min_mb", 1.0);
        let gateways = session.api().list_nat_gateways()?;

        let mut findings = Vec::new();
        for gateway in ctx.included(&gateways) {
            if gateway.state != "available" {
                continue;
            }
            let sent_mb = session.api().nat_bytes_out(&gateway.id, days)? as f64 / MIB;
            if sent_mb >= min_mb {
                continue;
            }
            let mut finding = ctx
                .finding(self, gateway, format!("{:.2} MB sent in {} days", sent_mb, days))
                .with_remediation(Self::DEFINITION.remediation)
                .with_detail("data_transfer_mb", (sent_mb * 100.0).round() / 100.0)
                .with_detail("days", days);
            if let Some(vpc) = &gateway.vpc_id {
                finding = finding.with_detail("vpc_id", vpc.as_str());
            }
            findings.push(finding);
        }
        Ok(findings)
    }
}

audit_check!(UnusedGatewaysCheck);
