//! Configuration commands

use super::GlobalOptions;
use clap::{Args, Subcommand};
use skyaudit_checks::default_registry;
use skyaudit_core::SettingsOverrides;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load the configuration and validate every profile
    Validate,

    /// Print the resolved settings of the selected profile
    Show(ShowArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    /// Print as JSON instead of YAML
    #[arg(long)]
    json: bool,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOptions) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(global),
        ConfigCommands::Show(args) => show(args, global),
    }
}

fn validate(global: &GlobalOptions) -> anyhow::Result<()> {
    let config = global.load_config()?;
    let registry = default_registry();
    let services = registry.services();

    let mut profiles = vec!["default"];
    profiles.extend(config.profile_names());

    let mut errors = Vec::new();
    for profile in &profiles {
        let resolved = config
            .settings(profile)
            .and_then(|s| s.validate_services(&services));
        if let Err(e) = resolved {
            errors.push(format!("{}: {}", profile, e));
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration:\n{}", errors.join("\n"));
    }

    match config.source() {
        Some(path) => println!("Configuration valid: {}", path.display()),
        None => println!("No configuration file found, built-in defaults are valid"),
    }
    println!("Profiles: {}", profiles.join(", "));

    Ok(())
}

fn show(args: ShowArgs, global: &GlobalOptions) -> anyhow::Result<()> {
    let settings = global.settings(SettingsOverrides::default())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        print!("{}", serde_yaml::to_string(&settings)?);
    }

    Ok(())
}
