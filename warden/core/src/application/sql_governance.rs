// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SQL Governance
//!
//! Decides whether a batch of classified statements may run under a
//! [`PolicyConfig`]. Pure and lock-free: any number of callers may check
//! concurrently against the same shared config.

use crate::domain::policy::{format_permitted, GovernanceDenied, PolicyConfig, LEGACY_WRITE_FLAG};
use crate::domain::statement::StatementType;

/// Check every statement of a batch. The first offending type fails the batch.
pub fn check(types: &[StatementType], config: &PolicyConfig) -> Result<(), GovernanceDenied> {
    if config.sql_is_legacy() {
        return match types.iter().find(|t| t.is_write()) {
            Some(&statement_type) if !config.legacy_allow_write => {
                Err(GovernanceDenied::LegacyWrite {
                    statement_type,
                    flag: LEGACY_WRITE_FLAG,
                })
            }
            _ => Ok(()),
        };
    }

    let permitted = config.permitted_sql_types();
    match types.iter().find(|t| !permitted.contains(*t)) {
        Some(&statement_type) => Err(GovernanceDenied::Sql {
            statement_type,
            permitted: format_permitted(&permitted),
        }),
        None => Ok(()),
    }
}
