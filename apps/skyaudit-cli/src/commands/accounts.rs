//! Account enumeration command

use super::{fatal, open_provider, GlobalOptions};
use clap::Args;
use skyaudit_core::SettingsOverrides;
use skyaudit_engine::AuditRunner;
use std::path::PathBuf;

#[derive(Args)]
pub struct AccountsArgs {
    /// Enumerate the organization instead of the caller's account
    #[arg(long)]
    organization: bool,

    /// Account used for organization calls
    #[arg(long)]
    org_admin_account: Option<String>,

    /// Inventory snapshot serving the cloud API
    #[arg(long)]
    inventory: PathBuf,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: AccountsArgs, global: &GlobalOptions) -> anyhow::Result<()> {
    let settings = global.settings(SettingsOverrides {
        organization: args.organization.then_some(true),
        org_admin_account_id: args.org_admin_account.clone(),
        ..Default::default()
    })?;
    let provider = open_provider(&args.inventory)?;

    let runner = AuditRunner::new(provider, settings);
    let accounts = runner.enumerate_accounts().map_err(fatal)?;

    if args.json {
        let value = serde_json::json!({
            "active": accounts.active,
            "inactive": accounts.inactive,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for account in &accounts.active {
        let excluded = runner.settings().exclude.excludes_account(&account.id);
        println!(
            "{}  {}{}",
            account.id,
            account.status,
            if excluded { "  (excluded)" } else { "" }
        );
    }
    for account in &accounts.inactive {
        println!("{}  {}  (skipped)", account.id, account.status);
    }
    println!(
        "\n{} active, {} inactive",
        accounts.active.len(),
        accounts.inactive.len()
    );

    Ok(())
}
