use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ct_cli::commands::{analyze, commits, open_database, predict, repos, status, sync};
use ct_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = std::io::stdout().lock();
    match command {
        Commands::Sync { project, full } => {
            let mut db = open_database(&config)?;
            sync::run(&mut stdout, &mut db, &config, project, *full)?;
        }
        Commands::Commits {
            project,
            limit,
            json,
        } => {
            let mut db = open_database(&config)?;
            commits::run(&mut stdout, &mut db, &config, project, *limit, *json)?;
        }
        Commands::Analyze { project, json } => {
            let mut db = open_database(&config)?;
            analyze::run(&mut stdout, &mut db, &config, project, *json)?;
        }
        Commands::Predict {
            project,
            description,
        } => {
            let mut db = open_database(&config)?;
            predict::run(&mut stdout, &mut db, &config, project, description)?;
        }
        Commands::Repos { json } => {
            repos::run(&mut stdout, &config, *json)?;
        }
        Commands::Status => {
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config)?;
        }
    }
    stdout.flush()?;

    Ok(())
}
