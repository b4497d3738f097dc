// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Governance policy commands
//!
//! Commands: show, check

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use pg_warden_core::application::policy::{AuthorizationRequest, PolicyEngine};
use pg_warden_core::application::tool_governance;
use pg_warden_core::domain::governance::verify_profile_hierarchy;
use pg_warden_core::domain::policy::{format_permitted, PolicyConfig};
use pg_warden_core::domain::tool::ToolCategory;

use super::load_manifest;

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Show the resolved policy and everything it permits
    Show,

    /// Dry-run authorization for a tool call
    Check {
        /// Tool identifier (e.g. lakebase_execute_query)
        #[arg(long, value_name = "TOOL_ID")]
        tool: String,

        /// SQL the tool would run
        #[arg(long, value_name = "SQL")]
        sql: Option<String>,

        /// Check an EXPLAIN ANALYZE request (explain tool only)
        #[arg(long)]
        analyze: bool,
    },
}

pub async fn handle_command(command: PolicyCommand, config_override: Option<PathBuf>) -> Result<()> {
    verify_profile_hierarchy()?;
    let policy = load_manifest(config_override)?.resolve_policy()?;

    match command {
        PolicyCommand::Show => {
            show(&policy);
            Ok(())
        }
        PolicyCommand::Check { tool, sql, analyze } => check(policy, &tool, sql.as_deref(), analyze),
    }
}

fn show(policy: &PolicyConfig) {
    println!("{}", "Governance policy:".bold());
    println!("  {}", policy.summary());
    println!();

    println!("{}", "Permitted SQL statement types:".bold());
    println!("  {}", format_permitted(&policy.permitted_sql_types()));
    println!();

    println!("{}", "Tools:".bold());
    let permitted = tool_governance::permitted_tools(policy);
    for category in ToolCategory::ALL {
        println!("  {}", category.to_string().bold());
        for tool in category.tools() {
            if permitted.contains(&tool) {
                println!("    {} {}", "✓".green(), tool);
            } else {
                println!("    {} {}", "✗".red(), tool.dimmed());
            }
        }
    }
}

fn check(policy: PolicyConfig, tool: &str, sql: Option<&str>, analyze: bool) -> Result<()> {
    let engine = PolicyEngine::new(Arc::new(policy));
    let request = AuthorizationRequest {
        tool_id: tool,
        sql,
        analyze,
    };
    debug!(tool, analyze, "Checking request against policy");

    match engine.authorize(&request) {
        Ok(authorized) => {
            println!("{}", "✓ Allowed".green());
            if !authorized.statement_types.is_empty() {
                let types: Vec<_> = authorized.statement_types.iter().map(|t| t.as_str()).collect();
                println!("  Statement types: {}", types.join(", "));
                println!("  Route: {:?}", authorized.route());
                if let Some(statement) = &authorized.statement {
                    println!("  Runs: {}", statement);
                }
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗ Denied:".red(), e);
            std::process::exit(1);
        }
    }
}
