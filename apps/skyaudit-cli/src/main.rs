//! Skyaudit CLI
//!
//! Audits every account of a cloud organization for cost and security issues.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Skyaudit - multi-account cloud cost and security auditor
#[derive(Parser)]
#[command(name = "skyaudit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./skyaudit.yaml or ~/.skyaudit/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(short, long, global = true, default_value = "default")]
    profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an audit
    Scan(commands::scan::ScanArgs),

    /// List available checks
    Checks(commands::checks::ChecksArgs),

    /// List the accounts a scan would target
    Accounts(commands::accounts::AccountsArgs),

    /// Configuration commands
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let global = commands::GlobalOptions {
        config: cli.config,
        profile: cli.profile,
    };

    match cli.command {
        Commands::Scan(args) => commands::scan::run(args, &global),
        Commands::Checks(args) => commands::checks::run(args),
        Commands::Accounts(args) => commands::accounts::run(args, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
    }
}
