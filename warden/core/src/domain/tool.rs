// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Catalog
//!
//! Static mapping from every tool identifier the server exposes to exactly one
//! [`ToolCategory`]. Categories are the unit that tool profiles and category
//! overrides operate on; the table is never inferred at runtime.
//!
//! | Category | Tools |
//! |----------|-------|
//! | `sql_query` | execute_query, read_query, explain_query |
//! | `schema_read` | list_schemas, list_tables, describe_table, object_tree |
//! | `project_read` | list_projects, describe_project, get_connection_string |
//! | `branch_read` / `branch_write` | list_branches / create_branch, delete_branch |
//! | `compute_read` / `compute_write` | status + metrics / autoscaling, scale-to-zero, restart, read replica |
//! | `migration` | prepare_migration, complete_migration |
//! | `sync_read` / `sync_write` | list_syncs / create_sync |
//! | `quality` | profile_table |
//! | `feature_read` | lookup_features, list_feature_tables |
//! | `insight` | append_insight |
//! | `uc_governance` | get_uc_permissions, check_my_access, governance_summary, list_catalog_grants |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Access-control grouping for tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    SqlQuery,
    SchemaRead,
    ProjectRead,
    BranchRead,
    BranchWrite,
    ComputeRead,
    ComputeWrite,
    Migration,
    SyncRead,
    SyncWrite,
    Quality,
    FeatureRead,
    Insight,
    UcGovernance,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 14] = [
        ToolCategory::SqlQuery,
        ToolCategory::SchemaRead,
        ToolCategory::ProjectRead,
        ToolCategory::BranchRead,
        ToolCategory::BranchWrite,
        ToolCategory::ComputeRead,
        ToolCategory::ComputeWrite,
        ToolCategory::Migration,
        ToolCategory::SyncRead,
        ToolCategory::SyncWrite,
        ToolCategory::Quality,
        ToolCategory::FeatureRead,
        ToolCategory::Insight,
        ToolCategory::UcGovernance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::SqlQuery => "sql_query",
            ToolCategory::SchemaRead => "schema_read",
            ToolCategory::ProjectRead => "project_read",
            ToolCategory::BranchRead => "branch_read",
            ToolCategory::BranchWrite => "branch_write",
            ToolCategory::ComputeRead => "compute_read",
            ToolCategory::ComputeWrite => "compute_write",
            ToolCategory::Migration => "migration",
            ToolCategory::SyncRead => "sync_read",
            ToolCategory::SyncWrite => "sync_write",
            ToolCategory::Quality => "quality",
            ToolCategory::FeatureRead => "feature_read",
            ToolCategory::Insight => "insight",
            ToolCategory::UcGovernance => "uc_governance",
        }
    }

    /// Tools belonging to this category, as listed in [`TOOL_CATALOG`].
    pub fn tools(&self) -> impl Iterator<Item = &'static str> + '_ {
        TOOL_CATALOG
            .iter()
            .filter(move |entry| entry.category == *self)
            .map(|entry| entry.name)
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown tool category: {0}")]
pub struct UnknownToolCategory(pub String);

impl FromStr for ToolCategory {
    type Err = UnknownToolCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ToolCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownToolCategory(s.to_string()))
    }
}

/// One row of the static tool table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolEntry {
    pub name: &'static str,
    pub category: ToolCategory,
    /// The tool carries a caller-supplied SQL string that must pass SQL governance.
    pub executes_sql: bool,
}

const fn tool(name: &'static str, category: ToolCategory) -> ToolEntry {
    ToolEntry { name, category, executes_sql: false }
}

const fn sql_tool(name: &'static str) -> ToolEntry {
    ToolEntry { name, category: ToolCategory::SqlQuery, executes_sql: true }
}

pub const EXECUTE_QUERY: &str = "lakebase_execute_query";
pub const READ_QUERY: &str = "lakebase_read_query";
pub const EXPLAIN_QUERY: &str = "lakebase_explain_query";

pub static TOOL_CATALOG: [ToolEntry; 31] = [
    sql_tool(EXECUTE_QUERY),
    sql_tool(READ_QUERY),
    sql_tool(EXPLAIN_QUERY),
    tool("lakebase_list_schemas", ToolCategory::SchemaRead),
    tool("lakebase_list_tables", ToolCategory::SchemaRead),
    tool("lakebase_describe_table", ToolCategory::SchemaRead),
    tool("lakebase_object_tree", ToolCategory::SchemaRead),
    tool("lakebase_list_projects", ToolCategory::ProjectRead),
    tool("lakebase_describe_project", ToolCategory::ProjectRead),
    tool("lakebase_get_connection_string", ToolCategory::ProjectRead),
    tool("lakebase_list_branches", ToolCategory::BranchRead),
    tool("lakebase_create_branch", ToolCategory::BranchWrite),
    tool("lakebase_delete_branch", ToolCategory::BranchWrite),
    tool("lakebase_get_compute_status", ToolCategory::ComputeRead),
    tool("lakebase_get_compute_metrics", ToolCategory::ComputeRead),
    tool("lakebase_configure_autoscaling", ToolCategory::ComputeWrite),
    tool("lakebase_configure_scale_to_zero", ToolCategory::ComputeWrite),
    tool("lakebase_restart_compute", ToolCategory::ComputeWrite),
    tool("lakebase_create_read_replica", ToolCategory::ComputeWrite),
    tool("lakebase_prepare_migration", ToolCategory::Migration),
    tool("lakebase_complete_migration", ToolCategory::Migration),
    tool("lakebase_list_syncs", ToolCategory::SyncRead),
    tool("lakebase_create_sync", ToolCategory::SyncWrite),
    tool("lakebase_profile_table", ToolCategory::Quality),
    tool("lakebase_lookup_features", ToolCategory::FeatureRead),
    tool("lakebase_list_feature_tables", ToolCategory::FeatureRead),
    tool("lakebase_append_insight", ToolCategory::Insight),
    tool("lakebase_get_uc_permissions", ToolCategory::UcGovernance),
    tool("lakebase_check_my_access", ToolCategory::UcGovernance),
    tool("lakebase_governance_summary", ToolCategory::UcGovernance),
    tool("lakebase_list_catalog_grants", ToolCategory::UcGovernance),
];

/// Look up a tool by identifier. Unknown identifiers return `None`.
pub fn lookup(tool_id: &str) -> Option<&'static ToolEntry> {
    TOOL_CATALOG.iter().find(|entry| entry.name == tool_id)
}

pub fn tool_category(tool_id: &str) -> Option<ToolCategory> {
    lookup(tool_id).map(|entry| entry.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_no_duplicates() {
        let names: HashSet<_> = TOOL_CATALOG.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), TOOL_CATALOG.len());
    }

    #[test]
    fn test_every_category_has_tools() {
        for category in ToolCategory::ALL {
            assert!(category.tools().next().is_some(), "{category} has no tools");
        }
    }

    #[test]
    fn test_only_sql_query_tools_execute_sql() {
        for entry in &TOOL_CATALOG {
            assert_eq!(entry.executes_sql, entry.category == ToolCategory::SqlQuery);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(tool_category("lakebase_create_branch"), Some(ToolCategory::BranchWrite));
        assert_eq!(tool_category("lakebase_check_my_access"), Some(ToolCategory::UcGovernance));
        assert_eq!(tool_category("lakebase_drop_database"), None);
        assert_eq!(
            ToolCategory::UcGovernance.tools().collect::<Vec<_>>(),
            vec![
                "lakebase_get_uc_permissions",
                "lakebase_check_my_access",
                "lakebase_governance_summary",
                "lakebase_list_catalog_grants",
            ]
        );
    }

    #[test]
    fn test_category_names_round_trip() {
        assert_eq!("UC_GOVERNANCE".parse::<ToolCategory>().unwrap(), ToolCategory::UcGovernance);
        assert!("billing".parse::<ToolCategory>().is_err());
    }
}
