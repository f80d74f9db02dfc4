//! Check listing command

use clap::Args;
use skyaudit_checks::default_registry;

#[derive(Args)]
pub struct ChecksArgs {
    /// Only list checks of these services
    #[arg(short, long, value_delimiter = ',')]
    service: Vec<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ChecksArgs) -> anyhow::Result<()> {
    let registry = default_registry();
    let checks: Vec<_> = registry
        .describe()
        .into_iter()
        .filter(|c| args.service.is_empty() || args.service.contains(&c.service))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
        return Ok(());
    }

    println!("Available Checks");
    println!("================\n");
    for check in &checks {
        println!(
            "{:<28} {:<9} {:<9}{}",
            check.id,
            check.kind.to_string(),
            check.severity.to_string(),
            if check.global { " (global)" } else { "" }
        );
        println!("    {}", check.description);
    }
    println!("\n{} checks", checks.len());

    Ok(())
}
