// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Engine
//!
//! Single entry point that gates every tool invocation. The tool layer runs
//! first and short-circuits; only tools that carry SQL reach the classifier and
//! the SQL layer. Each layer's denial is returned unchanged.
//!
//! The explain tool never runs caller SQL as given: it is wrapped in
//! `EXPLAIN (FORMAT JSON, VERBOSE[, ANALYZE, BUFFERS])`, the wrapped text is
//! what gets governed, and the result is always read-only.
//!
//! The engine holds its [`PolicyConfig`] behind an `Arc` and never mutates it,
//! so one engine is shared by every concurrent request.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::{sql_governance, tool_governance};
use crate::domain::policy::{AuthorizationError, GovernanceDenied, PolicyConfig};
use crate::domain::pool::Route;
use crate::domain::statement::StatementType;
use crate::domain::tool::{self, EXPLAIN_QUERY, READ_QUERY};
use crate::infrastructure::sql_classifier;

/// Statement types the read-only query tool accepts regardless of governance.
pub const READ_QUERY_TYPES: [StatementType; 4] = [
    StatementType::Select,
    StatementType::Explain,
    StatementType::Show,
    StatementType::Describe,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest<'a> {
    pub tool_id: &'a str,
    pub sql: Option<&'a str>,
    /// For the explain tool: run `EXPLAIN ANALYZE`, which executes the statement.
    pub analyze: bool,
}

impl<'a> AuthorizationRequest<'a> {
    pub fn tool(tool_id: &'a str) -> Self {
        Self { tool_id, sql: None, analyze: false }
    }

    pub fn sql(tool_id: &'a str, sql: &'a str) -> Self {
        Self { tool_id, sql: Some(sql), analyze: false }
    }

    /// A plan request for the explain tool.
    pub fn explain(sql: &'a str, analyze: bool) -> Self {
        Self { tool_id: EXPLAIN_QUERY, sql: Some(sql), analyze }
    }
}

/// Wrap caller SQL the way the explain tool runs it.
pub fn explain_statement(sql: &str, analyze: bool) -> String {
    if analyze {
        format!("EXPLAIN (FORMAT JSON, VERBOSE, ANALYZE, BUFFERS) {}", sql)
    } else {
        format!("EXPLAIN (FORMAT JSON, VERBOSE) {}", sql)
    }
}

/// A request that passed both layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    /// Classified statement types, empty for tools that carry no SQL.
    pub statement_types: Vec<StatementType>,
    /// Exactly the SQL that was governed and may be executed.
    pub statement: Option<String>,
    /// Run inside a `READ ONLY` transaction.
    pub read_only: bool,
}

impl Authorized {
    fn tool_only() -> Self {
        Self {
            statement_types: Vec::new(),
            statement: None,
            read_only: true,
        }
    }

    pub fn is_write(&self) -> bool {
        self.statement_types.iter().any(|t| t.is_write())
    }

    /// Read-only work may use the replica; anything else must hit primary.
    pub fn route(&self) -> Route {
        if self.read_only {
            Route::PreferReplica
        } else {
            Route::Primary
        }
    }
}

/// Authorize one request against `config`. Pure apart from logging.
pub fn authorize(
    request: &AuthorizationRequest<'_>,
    config: &PolicyConfig,
) -> Result<Authorized, AuthorizationError> {
    tool_governance::check(request.tool_id, config)?;

    let executes_sql = tool::lookup(request.tool_id).is_some_and(|entry| entry.executes_sql);
    let sql = match request.sql {
        Some(sql) if executes_sql => sql,
        _ => return Ok(Authorized::tool_only()),
    };

    let explain = request.tool_id == EXPLAIN_QUERY;
    let statement = if explain {
        explain_statement(sql, request.analyze)
    } else {
        sql.to_string()
    };

    let classified = sql_classifier::classify_detailed(&statement)?;
    let statement_types: Vec<StatementType> =
        classified.iter().map(|c| c.statement_type).collect();
    let governed: Vec<StatementType> =
        classified.iter().flat_map(|c| c.effective_types()).collect();
    debug!(tool = request.tool_id, types = ?statement_types, governed = ?governed, "Authorizing SQL");

    if request.tool_id == READ_QUERY {
        if let Some(&statement_type) = governed.iter().find(|t| !READ_QUERY_TYPES.contains(*t)) {
            return Err(GovernanceDenied::ReadOnlyTool {
                tool_id: request.tool_id.to_string(),
                statement_type,
            }
            .into());
        }
    }

    if let Some(function) = sql_classifier::find_blocked_function(&statement) {
        return Err(GovernanceDenied::BlockedFunction { function }.into());
    }

    sql_governance::check(&governed, config)?;

    // Plans never need write access; an analyzed write fails inside the
    // read-only transaction instead of changing data.
    let read_only = explain || !governed.iter().any(|t| t.is_write());
    Ok(Authorized {
        statement_types,
        statement: Some(statement),
        read_only,
    })
}

/// Shared, immutable policy gate.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: Arc<PolicyConfig>,
}

impl PolicyEngine {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        info!("Governance policy: {}", config.summary());
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Authorize a request, recording denials in logs and metrics.
    pub fn authorize(
        &self,
        request: &AuthorizationRequest<'_>,
    ) -> Result<Authorized, AuthorizationError> {
        let result = authorize(request, &self.config);
        if let Err(AuthorizationError::Denied(denied)) = &result {
            warn!(tool = request.tool_id, layer = denied.layer(), "Governance denied: {}", denied);
            metrics::counter!("warden_governance_denials_total", "layer" => denied.layer())
                .increment(1);
        }
        result
    }

    pub fn is_tool_permitted(&self, tool_id: &str) -> bool {
        tool_governance::is_permitted(tool_id, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::governance::GovernanceProfile;
    use crate::domain::statement::SqlError;
    use crate::domain::tool::{EXECUTE_QUERY, EXPLAIN_QUERY};
    use std::collections::BTreeSet;

    fn engine(config: PolicyConfig) -> PolicyEngine {
        PolicyEngine::new(Arc::new(config))
    }

    #[test]
    fn test_denied_tool_skips_sql_parsing() {
        let engine = engine(PolicyConfig {
            tool_denied: BTreeSet::from([EXECUTE_QUERY.to_string()]),
            ..PolicyConfig::legacy(true)
        });
        // Unparsable SQL would be a syntax error if the SQL layer ever ran.
        let err = engine
            .authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, "SELEC * FORM t"))
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::Denied(GovernanceDenied::Tool { .. })));
    }

    #[test]
    fn test_syntax_error_is_rejected() {
        let err = engine(PolicyConfig::legacy(true))
            .authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, "SELEC * FORM t"))
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::Sql(SqlError::Syntax(_))));
    }

    #[test]
    fn test_returns_types_and_route() {
        let engine = engine(PolicyConfig {
            sql_profile: Some(GovernanceProfile::Analyst),
            ..PolicyConfig::default()
        });
        let ok = engine
            .authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, "SELECT 1; INSERT INTO t VALUES (1)"))
            .unwrap();
        assert_eq!(ok.statement_types, vec![StatementType::Select, StatementType::Insert]);
        assert_eq!(ok.route(), Route::Primary);

        let read = engine
            .authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, "SELECT 1"))
            .unwrap();
        assert_eq!(read.route(), Route::PreferReplica);
    }

    #[test]
    fn test_non_sql_tool_ignores_sql() {
        let ok = engine(PolicyConfig::legacy(false))
            .authorize(&AuthorizationRequest::sql("lakebase_list_tables", "DROP TABLE t"))
            .unwrap();
        assert!(ok.statement_types.is_empty());
    }

    #[test]
    fn test_read_query_tool_rejects_writes_even_when_allowed() {
        let err = engine(PolicyConfig::legacy(true))
            .authorize(&AuthorizationRequest::sql(READ_QUERY, "DELETE FROM t"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only SELECT, EXPLAIN, SHOW, and DESCRIBE queries are allowed with lakebase_read_query. Statement type 'delete' was rejected."
        );
    }

    #[test]
    fn test_blocked_function() {
        let err = engine(PolicyConfig::legacy(true))
            .authorize(&AuthorizationRequest::sql(
                EXECUTE_QUERY,
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity",
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorizationError::Denied(GovernanceDenied::BlockedFunction { .. })
        ));
    }

    #[test]
    fn test_legacy_write_message_passes_through() {
        let err = engine(PolicyConfig::legacy(false))
            .authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, "UPDATE t SET a = 1"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Write operations are disabled. Set WARDEN_ALLOW_WRITE to enable INSERT, UPDATE, DELETE, DDL."
        );
    }

    #[test]
    fn test_cte_write_behind_insert_is_governed() {
        let err = engine(PolicyConfig {
            sql_profile: Some(GovernanceProfile::Analyst),
            ..PolicyConfig::default()
        })
        .authorize(&AuthorizationRequest::sql(
            EXECUTE_QUERY,
            "WITH d AS (UPDATE t SET a = 1 RETURNING *) INSERT INTO x SELECT * FROM d",
        ))
        .unwrap_err();
        assert!(err.to_string().starts_with("Statement type 'update' is not allowed."));
    }

    #[test]
    fn test_explain_option_list_cannot_smuggle_a_write() {
        let err = engine(PolicyConfig {
            sql_profile: Some(GovernanceProfile::ReadOnly),
            ..PolicyConfig::default()
        })
        .authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, "EXPLAIN (ANALYZE) DELETE FROM t"))
        .unwrap_err();
        assert!(err.to_string().starts_with("Statement type 'delete' is not allowed."));
    }

    #[test]
    fn test_explain_tool_wraps_and_stays_read_only() {
        let ok = engine(PolicyConfig::legacy(true))
            .authorize(&AuthorizationRequest::explain("DELETE FROM t", false))
            .unwrap();
        assert_eq!(ok.statement_types, vec![StatementType::Explain]);
        assert_eq!(
            ok.statement.as_deref(),
            Some("EXPLAIN (FORMAT JSON, VERBOSE) DELETE FROM t")
        );
        assert!(ok.read_only);
        assert_eq!(ok.route(), Route::PreferReplica);

        // Analysis executes the statement, so the wrapped write is governed as one.
        let analyzed = engine(PolicyConfig::legacy(true))
            .authorize(&AuthorizationRequest::explain("DELETE FROM t", true))
            .unwrap();
        assert_eq!(analyzed.statement_types, vec![StatementType::Delete]);
        assert!(analyzed.read_only);

        let err = engine(PolicyConfig::legacy(false))
            .authorize(&AuthorizationRequest::explain("DELETE FROM t", true))
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::Denied(GovernanceDenied::LegacyWrite { .. })));
    }

    #[test]
    fn test_explain_tool_via_plain_sql_request_is_wrapped() {
        let ok = engine(PolicyConfig::legacy(true))
            .authorize(&AuthorizationRequest::sql(EXPLAIN_QUERY, "SELECT 1"))
            .unwrap();
        assert_eq!(ok.statement.as_deref(), Some("EXPLAIN (FORMAT JSON, VERBOSE) SELECT 1"));
        assert!(ok.read_only);
    }

    #[test]
    fn test_tool_only_request() {
        let engine = engine(PolicyConfig {
            tool_profile: Some(GovernanceProfile::ReadOnly),
            ..PolicyConfig::default()
        });
        assert!(engine.authorize(&AuthorizationRequest::tool("lakebase_list_projects")).is_ok());
        assert!(!engine.is_tool_permitted("lakebase_restart_compute"));
    }
}
