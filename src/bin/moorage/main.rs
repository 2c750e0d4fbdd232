//! Moorage CLI - reference synchronization and dev supervision for
//! multi-package TypeScript workspaces

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.global.verbose {
        EnvFilter::new("moorage=debug")
    } else {
        EnvFilter::new("moorage=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    let global = cli.global;
    match cli.command {
        Commands::Deps(args) => commands::deps::execute(args),
        Commands::Tree(args) => commands::tree::execute(args, &global),
        Commands::Sync(args) => commands::sync::execute(args, &global),
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Watch(args) => commands::watch::execute(args, &global),
        Commands::Run(args) => commands::run::execute(args, &global),
        Commands::Resolve(args) => commands::resolve::execute(args),
        Commands::Load(args) => commands::load::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
