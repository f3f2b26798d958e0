use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabula_core::{init_logging, QueryDescriptor, TabulaConfig};
use tracing::{error, info};

mod commands;
mod fixture;

use commands::*;
use fixture::Fixture;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Run predicate queries against a Tabula table fixture")]
#[command(version = "0.2.0")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "tabula.toml", env = "TABULA_CONFIG")]
    config: PathBuf,

    /// Table fixture to load
    #[arg(short, long)]
    fixture: PathBuf,

    /// Query descriptor file replacing the fixture's own query
    #[arg(short, long)]
    query: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Query(QueryCommands),
    #[command(flatten)]
    View(ViewCommands),
}

fn load_descriptor(path: &Path) -> Result<QueryDescriptor> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TabulaConfig::load(&cli.config)?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;
    init_logging(&config.logging)?;

    info!("Tabula CLI v0.2.0 starting");

    let fixture = Fixture::load(&cli.fixture)?;
    let table = fixture.build(&config.engine)?;
    let descriptor = match &cli.query {
        Some(path) => load_descriptor(path)?,
        None => fixture.query.clone(),
    };
    let query = descriptor.to_query(&table)?;

    let result = match cli.command {
        Commands::Query(action) => execute_query_command(&table, &query, action),
        Commands::View(action) => execute_view_command(&table, &query, action),
    };

    for slow in table.slow_queries(None) {
        info!(
            "Slow {} on {}: {}ms over {} rows",
            slow.operation, slow.table, slow.duration_ms, slow.rows_scanned
        );
    }

    match result {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e)
        }
    }
}
