//! connpool - exercise a connection pool from the command line
//!
//! Reads pool settings from a `.properties` or `.toml` file and either
//! probes the database once (`check`) or hammers the pool from many
//! threads (`stress`).

mod check;
mod logging;
mod stress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use connpool_driver_sqlite::SqliteDriver;
use connpool_pool::{DriverRegistry, PoolRegistry};

#[derive(Parser, Debug)]
#[command(name = "connpool", version, about = "Bounded connection pool toolkit")]
struct Cli {
    /// Pool configuration file (.properties or .toml)
    #[arg(
        short,
        long,
        env = "CONNPOOL_CONFIG",
        default_value = "connpool.properties",
        global = true
    )]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the pool, run a probe query and tear the pool down
    Check(check::CheckArgs),
    /// Run many threads against the pool and verify exclusive ownership
    Stress(stress::StressArgs),
}

/// Every driver this binary can open
fn drivers() -> DriverRegistry {
    DriverRegistry::new().with_driver(Arc::new(SqliteDriver::new()))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let source = connpool_core::config::load_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let registry = PoolRegistry::new(drivers(), source);

    match cli.command {
        Command::Check(args) => check::run(&registry, &args),
        Command::Stress(args) => stress::run(&registry, &args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = logging::LoggingConfig::default()
        .with_verbosity(cli.verbose)
        .with_json(cli.log_json);
    if let Err(e) = logging::init(log_config) {
        eprintln!("warning: failed to initialize logging: {e:#}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_stress_arguments() {
        let cli = Cli::try_parse_from([
            "connpool",
            "--config",
            "db.toml",
            "stress",
            "--threads",
            "50",
            "--rounds",
            "20",
        ])
        .expect("parse");

        assert_eq!(cli.config, PathBuf::from("db.toml"));
        match cli.command {
            Command::Stress(args) => {
                assert_eq!(args.threads, 50);
                assert_eq!(args.rounds, 20);
            }
            other => panic!("expected stress command, got {other:?}"),
        }
    }
}
