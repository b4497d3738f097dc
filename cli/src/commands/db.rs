// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Database connectivity commands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use pg_warden_core::application::QueryService;
use pg_warden_core::domain::pool::Endpoint;

use super::load_manifest;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Check out a connection (retrying while compute wakes) and run SELECT 1
    Ping {
        /// Ping the read replica instead of primary
        #[arg(long)]
        replica: bool,
    },
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    let manifest = load_manifest(config_override)?;

    match command {
        DbCommand::Ping { replica } => {
            let endpoint = if replica { Endpoint::Replica } else { Endpoint::Primary };
            if manifest.endpoint(endpoint).is_none() {
                anyhow::bail!("No {} endpoint is configured", endpoint);
            }

            info!(endpoint = %endpoint, "Pinging database");
            let service = QueryService::initialize(&manifest)?;
            let result = service.ping(endpoint).await;
            service.close().await;

            let elapsed = result.with_context(|| format!("Failed to reach {}", endpoint.backend_name()))?;
            println!(
                "{}",
                format!("✓ {} is reachable ({} ms)", endpoint.backend_name(), elapsed.as_millis()).green()
            );
            Ok(())
        }
    }
}
