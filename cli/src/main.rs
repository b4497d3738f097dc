// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # pg-warden CLI
//!
//! The `pg-warden` binary inspects and exercises a governance policy and the
//! database pools it guards.
//!
//! ## Commands
//!
//! - `pg-warden config show|validate|generate` - Configuration management
//! - `pg-warden policy show|check` - Inspect the resolved policy, dry-run requests
//! - `pg-warden classify <SQL>` - Show statement types for SQL text
//! - `pg-warden db ping [--replica]` - Check connectivity through the retrying pool
//! - `pg-warden query --tool <ID> <SQL>` - Authorize and execute SQL

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use pg_warden::commands::{self, ClassifyArgs, ConfigCommand, DbCommand, PolicyCommand, QueryArgs};

/// pg-warden - SQL and tool governance for PostgreSQL tool servers
#[derive(Parser)]
#[command(name = "pg-warden")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "WARDEN_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "WARDEN_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, global = true, env = "WARDEN_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Governance policy inspection
    #[command(name = "policy")]
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },

    /// Classify SQL statements
    #[command(name = "classify")]
    Classify {
        #[command(flatten)]
        command: ClassifyArgs,
    },

    /// Database connectivity
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Execute governed SQL
    #[command(name = "query")]
    Query {
        #[command(flatten)]
        command: QueryArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Policy { command }) => {
            commands::policy::handle_command(command, cli.config).await
        }
        Some(Commands::Classify { command }) => commands::classify::execute(command).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        Some(Commands::Query { command }) => commands::query::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}
