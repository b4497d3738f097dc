// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use pg_warden_core::domain::pool::Endpoint;
use pg_warden_core::domain::warden_config::WardenConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./warden-config.yaml)
        #[arg(short, long, default_value = "./warden-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = WardenConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. WARDEN_CONFIG_PATH: {}",
            std::env::var("WARDEN_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./warden-config.yaml");
        println!("  4. ~/.warden/config.yaml");
        println!("  5. /etc/warden/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let governance = &config.spec.governance;
    println!("{}", "SQL Governance:".bold());
    println!("  Profile: {}", governance.sql.profile.as_deref().unwrap_or("(none)"));
    println!("  Allowed types: {}", list(&governance.sql.allowed_types));
    println!("  Denied types: {}", list(&governance.sql.denied_types));
    println!();

    println!("{}", "Tool Governance:".bold());
    println!("  Profile: {}", governance.tools.profile.as_deref().unwrap_or("(none)"));
    println!("  Allowed categories: {}", list(&governance.tools.allowed_categories));
    println!("  Denied categories: {}", list(&governance.tools.denied_categories));
    println!("  Allowed tools: {}", list(&governance.tools.allowed_tools));
    println!("  Denied tools: {}", list(&governance.tools.denied_tools));
    println!("  Legacy allow_write: {}", governance.allow_write);
    println!();

    println!("{}", "Database:".bold());
    for endpoint in [Endpoint::Primary, Endpoint::Replica] {
        match config.endpoint(endpoint) {
            Some(e) => println!(
                "  {}: {}:{}/{} (user: {})",
                endpoint,
                e.host,
                e.port,
                e.database,
                e.user.as_deref().unwrap_or("(default)")
            ),
            None => println!("  {}: {}", endpoint, "(not configured)".dimmed()),
        }
    }
    let pool = &config.spec.database.pool;
    let retry = &config.spec.database.retry;
    println!(
        "  Pool: {}-{} connections, lifetime {}s, idle {}s, connect timeout {}s",
        pool.min_size,
        pool.max_size,
        pool.max_lifetime_seconds,
        pool.max_idle_seconds,
        pool.connect_timeout_seconds
    );
    println!(
        "  Wake-up retry: {} attempts, {}s doubling to {}s",
        retry.attempts, retry.base_delay_seconds, retry.max_delay_seconds
    );
    println!("  Max rows: {}", config.spec.database.max_rows);
    println!();

    Ok(())
}

fn list(values: &Option<Vec<String>>) -> String {
    match values {
        Some(v) if !v.is_empty() => v.join(", "),
        _ => "(none)".to_string(),
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = WardenConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    println!("  Policy: {}", config.resolve_policy()?.summary());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
