//! Security group checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{
    CheckKind, ExecutionContext, Finding, Result, SecurityGroup, Session, Severity,
};

/// Remote administration ports
const ADMIN_PORTS: &[u16] = &[22, 3389];

/// MySQL, PostgreSQL, SQL Server, Oracle, MongoDB, Redis
const DATABASE_PORTS: &[u16] = &[3306, 5432, 1433, 1521, 27017, 6379];

/// Ports from `ports` reachable from anywhere through the group's ingress rules
fn world_open_ports(group: &SecurityGroup, ports: &[u16]) -> Vec<u16> {
    ports
        .iter()
        .copied()
        .filter(|port| {
            group
                .ingress
                .iter()
                .any(|rule| rule.open_to_world() && rule.covers_port(*port))
        })
        .collect()
}

fn open_port_findings(
    check: &dyn skyaudit_core::AuditCheck,
    definition: &CheckDefinition,
    session: &Session,
    ctx: &ExecutionContext,
    ports: &[u16],
) -> Result<Vec<Finding>> {
    let groups = session.api().list_security_groups()?;

    let mut findings = Vec::new();
    for group in ctx.included(&groups) {
        let open = world_open_ports(group, ports);
        if open.is_empty() {
            continue;
        }
        let list = open
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        findings.push(
            ctx.finding(
                check,
                group,
                format!("Security group {} allows 0.0.0.0/0 on port(s) {}", group.name, list),
            )
            .with_remediation(definition.remediation)
            .with_detail("group_name", group.name.as_str())
            .with_detail("ports", open),
        );
    }
    Ok(findings)
}

pub struct SshRdpOpenCheck;

impl SshRdpOpenCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "sg.ssh_rdp_open",
        service: "sg",
        name: "SSH/RDP open to the world",
        description: "Ingress rules admitting 0.0.0.0/0 on port 22 or 3389",
        kind: CheckKind::Security,
        severity: Severity::Critical,
        global: false,
        remediation: "Restrict the source range or use a bastion or session manager",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        open_port_findings(self, &Self::DEFINITION, session, ctx, ADMIN_PORTS)
    }
}

audit_check!(SshRdpOpenCheck);

pub struct DatabasePortsOpenCheck;

impl DatabasePortsOpenCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "sg.database_ports_open",
        service: "sg",
        name: "Database ports open to the world",
        description: "Ingress rules admitting 0.0.0.0/0 on common database ports",
        kind: CheckKind::Security,
        severity: Severity::Critical,
        global: false,
        remediation: "Allow database ports only from application security groups",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        open_port_findings(self, &Self::DEFINITION, session, ctx, DATABASE_PORTS)
    }
}

audit_check!(DatabasePortsOpenCheck);
