// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Governed query execution command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{info, warn};

use pg_warden_core::application::{AuthorizationRequest, QueryError, QueryService};
use pg_warden_core::domain::tool::EXECUTE_QUERY;

use super::load_manifest;

#[derive(Args)]
pub struct QueryArgs {
    /// Tool identifier the SQL is run on behalf of
    #[arg(long, value_name = "TOOL_ID", default_value = EXECUTE_QUERY)]
    pub tool: String,

    /// Maximum rows to return (capped by database.max_rows)
    #[arg(long)]
    pub max_rows: Option<u32>,

    /// With the explain tool, run EXPLAIN ANALYZE
    #[arg(long)]
    pub analyze: bool,

    /// SQL text
    #[arg(value_name = "SQL")]
    pub sql: String,
}

pub async fn execute(args: QueryArgs, config_override: Option<PathBuf>) -> Result<()> {
    let manifest = load_manifest(config_override)?;
    let service = QueryService::initialize(&manifest)?;

    let request = AuthorizationRequest {
        tool_id: &args.tool,
        sql: Some(&args.sql),
        analyze: args.analyze,
    };
    info!(tool = %args.tool, "Running governed query");
    let result = service.run(&request, args.max_rows).await;
    service.close().await;

    match result {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.truncated {
                eprintln!("{}", "Result truncated to max_rows".yellow());
            }
            Ok(())
        }
        Err(QueryError::Authorization(denied)) => {
            eprintln!("{} {}", "✗ Denied:".red(), denied);
            std::process::exit(1);
        }
        Err(e) => {
            warn!(tool = %args.tool, "Query failed: {}", e);
            Err(e).context("Query failed")
        }
    }
}
