// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SQL Statement Types
//!
//! The closed set of statement tags the classifier can produce, plus the static
//! write/non-write table that legacy mode and request routing are derived from.
//!
//! Tags are rendered in lower case (`select`, `insert`, ...) because that is the
//! form operators write in configuration and the form denial messages list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classified kind of a single top-level SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Merge,
    Truncate,
    Grant,
    Revoke,
    Use,
    Show,
    Describe,
    Explain,
    Set,
    Call,
}

impl StatementType {
    /// Every statement type, in declaration order.
    pub const ALL: [StatementType; 17] = [
        StatementType::Select,
        StatementType::Insert,
        StatementType::Update,
        StatementType::Delete,
        StatementType::Create,
        StatementType::Drop,
        StatementType::Alter,
        StatementType::Merge,
        StatementType::Truncate,
        StatementType::Grant,
        StatementType::Revoke,
        StatementType::Use,
        StatementType::Show,
        StatementType::Describe,
        StatementType::Explain,
        StatementType::Set,
        StatementType::Call,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Select => "select",
            StatementType::Insert => "insert",
            StatementType::Update => "update",
            StatementType::Delete => "delete",
            StatementType::Create => "create",
            StatementType::Drop => "drop",
            StatementType::Alter => "alter",
            StatementType::Merge => "merge",
            StatementType::Truncate => "truncate",
            StatementType::Grant => "grant",
            StatementType::Revoke => "revoke",
            StatementType::Use => "use",
            StatementType::Show => "show",
            StatementType::Describe => "describe",
            StatementType::Explain => "explain",
            StatementType::Set => "set",
            StatementType::Call => "call",
        }
    }

    /// Whether a statement of this type can change state.
    ///
    /// Only SELECT, SHOW, DESCRIBE and EXPLAIN are non-write.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            StatementType::Select
                | StatementType::Show
                | StatementType::Describe
                | StatementType::Explain
        )
    }
}

/// Free-function form of [`StatementType::is_write`].
pub fn is_write(statement_type: StatementType) -> bool {
    statement_type.is_write()
}

/// One top-level statement with every write it performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatement {
    pub statement_type: StatementType,
    /// Write types of data-modifying CTEs anywhere inside the statement.
    pub nested_writes: Vec<StatementType>,
}

impl ClassifiedStatement {
    /// The top-level tag followed by every nested write.
    pub fn effective_types(&self) -> impl Iterator<Item = StatementType> + '_ {
        std::iter::once(self.statement_type).chain(self.nested_writes.iter().copied())
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown SQL statement type: {0}")]
pub struct UnknownStatementType(pub String);

impl FromStr for StatementType {
    type Err = UnknownStatementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        StatementType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownStatementType(s.to_string()))
    }
}

/// Failure to turn SQL text into statement types.
///
/// None of these are ever treated as a permissive classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error("SQL text is empty")]
    Empty,

    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("Could not determine SQL statement type for: {0}")]
    Unclassified(String),
}
