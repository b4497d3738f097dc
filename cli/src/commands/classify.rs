// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! SQL classification command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pg_warden_core::domain::statement::StatementType;
use pg_warden_core::infrastructure::sql_classifier;

#[derive(Args)]
pub struct ClassifyArgs {
    /// SQL text (one or more statements)
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Print a JSON array instead of one line per statement
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ClassifyArgs) -> Result<()> {
    let types = sql_classifier::classify(&args.sql).context("Failed to classify SQL")?;

    if args.json {
        println!("{}", serde_json::to_string(&types)?);
        return Ok(());
    }

    for line in render(&types) {
        println!("{}", line);
    }
    if let Some(function) = sql_classifier::find_blocked_function(&args.sql) {
        println!("{} calls blocked function {}", "!".yellow(), function);
    }
    Ok(())
}

fn render(types: &[StatementType]) -> Vec<String> {
    types
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let kind = if t.is_write() { "write" } else { "read" };
            format!("{}. {} ({})", i + 1, t.as_str().to_uppercase(), kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(
            render(&[StatementType::Select, StatementType::Insert]),
            vec!["1. SELECT (read)".to_string(), "2. INSERT (write)".to_string()]
        );
    }
}
