// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Governance Profiles
//!
//! Named bundles of permitted statement types and tool categories. Profiles are
//! pure data looked up by enum; they form a strict hierarchy
//! `read_only ⊆ analyst ⊆ developer ⊆ admin` which [`verify_profile_hierarchy`]
//! checks once at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::statement::StatementType;
use crate::domain::tool::ToolCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceProfile {
    ReadOnly,
    Analyst,
    Developer,
    Admin,
}

const READ_ONLY_SQL: &[StatementType] = &[
    StatementType::Select,
    StatementType::Show,
    StatementType::Describe,
    StatementType::Explain,
];

const ANALYST_SQL: &[StatementType] = &[
    StatementType::Select,
    StatementType::Show,
    StatementType::Describe,
    StatementType::Explain,
    StatementType::Insert,
    StatementType::Set,
];

const DEVELOPER_SQL: &[StatementType] = &[
    StatementType::Select,
    StatementType::Insert,
    StatementType::Update,
    StatementType::Delete,
    StatementType::Create,
    StatementType::Alter,
    StatementType::Show,
    StatementType::Describe,
    StatementType::Explain,
    StatementType::Set,
    StatementType::Call,
];

const READ_ONLY_TOOLS: &[ToolCategory] = &[
    ToolCategory::SqlQuery,
    ToolCategory::SchemaRead,
    ToolCategory::ProjectRead,
    ToolCategory::BranchRead,
    ToolCategory::ComputeRead,
    ToolCategory::SyncRead,
    ToolCategory::Quality,
    ToolCategory::FeatureRead,
    ToolCategory::Insight,
    ToolCategory::UcGovernance,
];

const DEVELOPER_TOOLS: &[ToolCategory] = &[
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

impl GovernanceProfile {
    /// Profiles from least to most privileged.
    pub const HIERARCHY: [GovernanceProfile; 4] = [
        GovernanceProfile::ReadOnly,
        GovernanceProfile::Analyst,
        GovernanceProfile::Developer,
        GovernanceProfile::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceProfile::ReadOnly => "read_only",
            GovernanceProfile::Analyst => "analyst",
            GovernanceProfile::Developer => "developer",
            GovernanceProfile::Admin => "admin",
        }
    }

    pub fn sql_types(&self) -> &'static [StatementType] {
        match self {
            GovernanceProfile::ReadOnly => READ_ONLY_SQL,
            GovernanceProfile::Analyst => ANALYST_SQL,
            GovernanceProfile::Developer => DEVELOPER_SQL,
            GovernanceProfile::Admin => &StatementType::ALL,
        }
    }

    /// Analyst shares the read-only tool set; its extra reach is in SQL only.
    pub fn tool_categories(&self) -> &'static [ToolCategory] {
        match self {
            GovernanceProfile::ReadOnly | GovernanceProfile::Analyst => READ_ONLY_TOOLS,
            GovernanceProfile::Developer => DEVELOPER_TOOLS,
            GovernanceProfile::Admin => &ToolCategory::ALL,
        }
    }

    pub fn sql_type_set(&self) -> BTreeSet<StatementType> {
        self.sql_types().iter().copied().collect()
    }

    pub fn tool_category_set(&self) -> BTreeSet<ToolCategory> {
        self.tool_categories().iter().copied().collect()
    }
}

impl fmt::Display for GovernanceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown governance profile '{0}'. Expected one of: read_only, analyst, developer, admin")]
pub struct UnknownProfile(pub String);

impl FromStr for GovernanceProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        GovernanceProfile::HIERARCHY
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileHierarchyError {
    #[error("SQL profile '{upper}' does not include '{missing}' granted by '{lower}'")]
    SqlDrift {
        lower: GovernanceProfile,
        upper: GovernanceProfile,
        missing: StatementType,
    },

    #[error("Tool profile '{upper}' does not include category '{missing}' granted by '{lower}'")]
    ToolDrift {
        lower: GovernanceProfile,
        upper: GovernanceProfile,
        missing: ToolCategory,
    },
}

/// Checks that each profile grants everything the profile below it grants.
pub fn verify_profile_hierarchy() -> Result<(), ProfileHierarchyError> {
    for pair in GovernanceProfile::HIERARCHY.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);

        let upper_sql = upper.sql_type_set();
        if let Some(missing) = lower.sql_types().iter().find(|t| !upper_sql.contains(*t)) {
            return Err(ProfileHierarchyError::SqlDrift { lower, upper, missing: *missing });
        }

        let upper_tools = upper.tool_category_set();
        if let Some(missing) = lower.tool_categories().iter().find(|c| !upper_tools.contains(*c)) {
            return Err(ProfileHierarchyError::ToolDrift { lower, upper, missing: *missing });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_holds() {
        assert!(verify_profile_hierarchy().is_ok());
    }

    #[test]
    fn test_every_lower_profile_is_subset() {
        for (i, lower) in GovernanceProfile::HIERARCHY.iter().enumerate() {
            for upper in &GovernanceProfile::HIERARCHY[i..] {
                assert!(lower.sql_type_set().is_subset(&upper.sql_type_set()));
                assert!(lower.tool_category_set().is_subset(&upper.tool_category_set()));
            }
        }
    }

    #[test]
    fn test_profile_contents() {
        assert_eq!(GovernanceProfile::ReadOnly.sql_types().len(), 4);
        assert_eq!(GovernanceProfile::Admin.sql_types().len(), 17);
        assert_eq!(GovernanceProfile::Admin.tool_categories().len(), 14);
        assert_eq!(
            GovernanceProfile::Analyst.tool_category_set(),
            GovernanceProfile::ReadOnly.tool_category_set()
        );
        assert!(!GovernanceProfile::Developer.sql_type_set().contains(&StatementType::Drop));
        assert!(GovernanceProfile::Developer
            .tool_category_set()
            .contains(&ToolCategory::Migration));
    }

    #[test]
    fn test_parse_profile() {
        assert_eq!("Developer".parse::<GovernanceProfile>().unwrap(), GovernanceProfile::Developer);
        let err = "superuser".parse::<GovernanceProfile>().unwrap_err();
        assert!(err.to_string().contains("superuser"));
    }
}
