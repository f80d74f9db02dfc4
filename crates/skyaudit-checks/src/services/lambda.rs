//! Lambda function checks

use crate::{audit_check, CheckDefinition};
use skyaudit_core::{CheckKind, ExecutionContext, Finding, Result, Session, Severity};

pub struct UnusedFunctionsCheck;

impl UnusedFunctionsCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "lambda.unused_functions",
        service: "lambda",
        name: "Unused functions",
        description: "Functions with no invocations over idle_days",
        kind: CheckKind::Cost,
        severity: Severity::Medium,
        global: false,
        remediation: "Delete the function or its provisioned concurrency",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let days = ctx.params().days("idle_days", 7);
        let functions = session.api().list_functions()?;

        let mut findings = Vec::new();
        for function in ctx.included(&functions) {
            if session.api().function_invocations(&function.name, days)? > 0 {
                continue;
            }
            findings.push(
                ctx.finding(self, function, format!("No invocations in {} days", days))
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("days", days),
            );
        }
        Ok(findings)
    }
}

audit_check!(UnusedFunctionsCheck);

pub struct OverProvisionedCheck;

impl OverProvisionedCheck {
    const DEFINITION: CheckDefinition = CheckDefinition {
        id: "lambda.over_provisioned",
        service: "lambda",
        name: "Over-provisioned memory",
        description: "Functions configured with more memory than lambda_memory",
        kind: CheckKind::Cost,
        severity: Severity::Low,
        global: false,
        remediation: "Measure peak memory and lower the configured size",
    };

    fn run(&self, session: &Session, ctx: &ExecutionContext) -> Result<Vec<Finding>> {
        let limit = ctx.params().threshold("lambda_memory", 512.0);
        let functions = session.api().list_functions()?;

        Ok(ctx
            .included(&functions)
            .into_iter()
            .filter(|f| f.memory_mb as f64 > limit)
            .map(|f| {
                ctx.finding(self, f, format!("{} MB configured", f.memory_mb))
                    .with_remediation(Self::DEFINITION.remediation)
                    .with_detail("memory_mb", f.memory_mb)
                    .with_detail("threshold", limit)
            })
            .collect())
    }
}

audit_check!(OverProvisionedCheck);
