// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resolved Governance Policy
//!
//! [`PolicyConfig`] is the immutable, fully-resolved policy for one process. It is
//! built once from [`crate::domain::warden_config::WardenConfigManifest`] at
//! startup, wrapped in an `Arc`, and handed explicitly to every policy check.
//! Nothing mutates it afterwards, so concurrent checks need no locking.
//!
//! [`GovernanceDenied`] carries the exact user-facing denial messages; downstream
//! tooling parses them, so their wording is part of the contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::governance::GovernanceProfile;
use crate::domain::statement::{SqlError, StatementType};
use crate::domain::tool::ToolCategory;

/// Name of the legacy write-enable flag, as surfaced in denial messages.
pub const LEGACY_WRITE_FLAG: &str = "WARDEN_ALLOW_WRITE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub sql_profile: Option<GovernanceProfile>,
    pub sql_allowed_types: BTreeSet<StatementType>,
    pub sql_denied_types: BTreeSet<StatementType>,

    pub tool_profile: Option<GovernanceProfile>,
    pub tool_allowed_categories: BTreeSet<ToolCategory>,
    pub tool_denied_categories: BTreeSet<ToolCategory>,
    pub tool_allowed: BTreeSet<String>,
    pub tool_denied: BTreeSet<String>,

    pub legacy_allow_write: bool,
}

impl PolicyConfig {
    /// Policy with no governance configured: every tool allowed, writes gated
    /// solely by `allow_write`.
    pub fn legacy(allow_write: bool) -> Self {
        Self {
            legacy_allow_write: allow_write,
            ..Self::default()
        }
    }

    pub fn sql_is_legacy(&self) -> bool {
        self.sql_profile.is_none()
            && self.sql_allowed_types.is_empty()
            && self.sql_denied_types.is_empty()
    }

    pub fn tools_are_legacy(&self) -> bool {
        self.tool_profile.is_none()
            && self.tool_allowed_categories.is_empty()
            && self.tool_denied_categories.is_empty()
            && self.tool_allowed.is_empty()
            && self.tool_denied.is_empty()
    }

    /// True when no governance setting of any kind is present.
    pub fn is_legacy(&self) -> bool {
        self.sql_is_legacy() && self.tools_are_legacy()
    }

    /// Statement types currently permitted, after profile, overrides and legacy rules.
    pub fn permitted_sql_types(&self) -> BTreeSet<StatementType> {
        if self.sql_is_legacy() {
            return StatementType::ALL
                .into_iter()
                .filter(|t| self.legacy_allow_write || !t.is_write())
                .collect();
        }

        let mut permitted = self
            .sql_profile
            .map(|p| p.sql_type_set())
            .unwrap_or_default();
        permitted.extend(self.sql_allowed_types.iter().copied());
        permitted
            .difference(&self.sql_denied_types)
            .copied()
            .collect()
    }

    /// Categories permitted at category granularity. Individual overrides are not
    /// reflected here.
    pub fn permitted_tool_categories(&self) -> BTreeSet<ToolCategory> {
        if self.tools_are_legacy() {
            return ToolCategory::ALL.into_iter().collect();
        }

        let mut permitted = self
            .tool_profile
            .map(|p| p.tool_category_set())
            .unwrap_or_default();
        permitted.extend(self.tool_allowed_categories.iter().copied());
        permitted
            .difference(&self.tool_denied_categories)
            .copied()
            .collect()
    }

    /// One-line description for startup logs.
    pub fn summary(&self) -> String {
        if self.is_legacy() {
            return format!(
                "legacy mode (allow_write={}, sql_types={}, all tools accessible)",
                self.legacy_allow_write,
                self.permitted_sql_types().len()
            );
        }
        format!(
            "active (sql_profile={}, sql_types={}, tool_profile={}, tool_categories={}, tool_allow={}, tool_deny={})",
            self.sql_profile.map(|p| p.as_str()).unwrap_or("unset"),
            self.permitted_sql_types().len(),
            self.tool_profile.map(|p| p.as_str()).unwrap_or("unset"),
            self.permitted_tool_categories().len(),
            self.tool_allowed.len(),
            self.tool_denied.len(),
        )
    }
}

/// Renders a permitted set the way denial messages list it: sorted by name.
pub fn format_permitted(types: &BTreeSet<StatementType>) -> String {
    let mut names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
    names.sort_unstable();
    names.join(", ")
}

/// A governance layer rejected the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceDenied {
    #[error("Statement type '{statement_type}' is not allowed. Permitted types: {permitted}")]
    Sql {
        statement_type: StatementType,
        permitted: String,
    },

    #[error("Write operations are disabled. Set {flag} to enable INSERT, UPDATE, DELETE, DDL.")]
    LegacyWrite {
        statement_type: StatementType,
        flag: &'static str,
    },

    #[error("Tool '{tool_id}' is not permitted by the current governance policy.")]
    Tool { tool_id: String },

    #[error("Only SELECT, EXPLAIN, SHOW, and DESCRIBE queries are allowed with {tool_id}. Statement type '{statement_type}' was rejected.")]
    ReadOnlyTool {
        tool_id: String,
        statement_type: StatementType,
    },

    #[error("Query contains blocked function: {function}")]
    BlockedFunction { function: String },
}

impl GovernanceDenied {
    /// The governance layer that produced the denial, for logs and metrics.
    pub fn layer(&self) -> &'static str {
        match self {
            GovernanceDenied::Tool { .. } => "tool",
            _ => "sql",
        }
    }
}

/// Outcome of authorizing a request that did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error(transparent)]
    Denied(#[from] GovernanceDenied),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_permitted_sets() {
        let read_only = PolicyConfig::legacy(false);
        assert!(read_only.is_legacy());
        assert_eq!(
            format_permitted(&read_only.permitted_sql_types()),
            "describe, explain, select, show"
        );

        let writable = PolicyConfig::legacy(true);
        assert_eq!(writable.permitted_sql_types().len(), 17);
        assert_eq!(writable.permitted_tool_categories().len(), 14);
    }

    #[test]
    fn test_deny_beats_profile() {
        let config = PolicyConfig {
            sql_profile: Some(GovernanceProfile::Developer),
            sql_denied_types: BTreeSet::from([StatementType::Create]),
            ..PolicyConfig::default()
        };
        let permitted = config.permitted_sql_types();
        assert!(!permitted.contains(&StatementType::Create));
        assert!(permitted.contains(&StatementType::Insert));
    }

    #[test]
    fn test_overrides_without_profile_start_empty() {
        let config = PolicyConfig {
            sql_allowed_types: BTreeSet::from([StatementType::Select]),
            ..PolicyConfig::default()
        };
        assert!(!config.sql_is_legacy());
        assert_eq!(config.permitted_sql_types(), BTreeSet::from([StatementType::Select]));
    }

    #[test]
    fn test_message_shapes() {
        let sql = GovernanceDenied::Sql {
            statement_type: StatementType::Insert,
            permitted: "describe, explain, select, show".to_string(),
        };
        assert_eq!(
            sql.to_string(),
            "Statement type 'insert' is not allowed. Permitted types: describe, explain, select, show"
        );

        let tool = GovernanceDenied::Tool { tool_id: "lakebase_create_branch".to_string() };
        assert_eq!(
            tool.to_string(),
            "Tool 'lakebase_create_branch' is not permitted by the current governance policy."
        );

        let legacy = GovernanceDenied::LegacyWrite {
            statement_type: StatementType::Drop,
            flag: LEGACY_WRITE_FLAG,
        };
        assert_eq!(
            legacy.to_string(),
            "Write operations are disabled. Set WARDEN_ALLOW_WRITE to enable INSERT, UPDATE, DELETE, DDL."
        );
    }

    #[test]
    fn test_summary_mentions_mode() {
        assert!(PolicyConfig::legacy(false).summary().starts_with("legacy mode"));
        let config = PolicyConfig {
            tool_profile: Some(GovernanceProfile::Admin),
            ..PolicyConfig::default()
        };
        assert!(config.summary().contains("tool_profile=admin"));
    }
}
