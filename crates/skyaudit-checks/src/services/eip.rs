//! Elastic IP checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct UnattachedAddressesCheck;

impl UnattachedAddressesCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "eip.unattached",
        service: "eip",
        name: "Unattached Elastic IPs",
        description: "Addresses associated with neither an instance nor a network interface",
        kind: CheckKind::Cost,
        severity: Severity::High,
        global: false,
        remediation: "Release the address if it is no longer needed",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let addresses = session.api().list_addresses()?;

        Ok(ctx
            .included(&addresses)
            .into_iter()
            .filter(|a| a.instance_id.is_none() && a.network_interface_id.is_none())
            .map(|a| {
                ctx.finding(self, a, format!("Elastic IP {} is not associated", a.public_ip))
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("public_ip", a.public_ip.as_str())
            })
            .collect())
    }
}

audit_check!(UnattachedAddressesCheck);
