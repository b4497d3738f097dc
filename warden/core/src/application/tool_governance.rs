// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Governance
//!
//! Decides whether a tool may be invoked at all. Precedence, most specific
//! first:
//!
//! 1. unknown tool identifiers are denied
//! 2. no tool settings at all: every known tool is allowed
//! 3. an individual deny always rejects
//! 4. a non-empty individual allow-list is exclusive
//! 5. otherwise the tool's category must be permitted

use crate::domain::policy::{GovernanceDenied, PolicyConfig};
use crate::domain::tool;

pub fn check(tool_id: &str, config: &PolicyConfig) -> Result<(), GovernanceDenied> {
    if is_permitted(tool_id, config) {
        Ok(())
    } else {
        Err(GovernanceDenied::Tool {
            tool_id: tool_id.to_string(),
        })
    }
}

pub fn is_permitted(tool_id: &str, config: &PolicyConfig) -> bool {
    let Some(category) = tool::tool_category(tool_id) else {
        return false;
    };

    if config.tools_are_legacy() {
        return true;
    }
    if config.tool_denied.contains(tool_id) {
        return false;
    }
    if !config.tool_allowed.is_empty() {
        return config.tool_allowed.contains(tool_id);
    }
    config.permitted_tool_categories().contains(&category)
}

/// Every catalog tool permitted under `config`, in catalog order.
pub fn permitted_tools(config: &PolicyConfig) -> Vec<&'static str> {
    tool::TOOL_CATALOG
        .iter()
        .map(|entry| entry.name)
        .filter(|name| is_permitted(name, config))
        .collect()
}
