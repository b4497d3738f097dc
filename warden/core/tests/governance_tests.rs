// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end governance properties, exercised through `authorize` with
//! synthetic policies:
//! - profile hierarchy holds across both layers
//! - CTE and batch classification feed SQL governance correctly
//! - deny overrides allow at every granularity
//! - a governance-free config behaves exactly like the legacy write switch

use pg_warden_core::application::policy::{authorize, AuthorizationRequest};
use pg_warden_core::domain::governance::{verify_profile_hierarchy, GovernanceProfile};
use pg_warden_core::domain::policy::{AuthorizationError, GovernanceDenied, PolicyConfig};
use pg_warden_core::domain::statement::{SqlError, StatementType};
use pg_warden_core::domain::tool::{ToolCategory, EXECUTE_QUERY, TOOL_CATALOG};
use std::collections::BTreeSet;

fn sql_profile(profile: GovernanceProfile) -> PolicyConfig {
    PolicyConfig {
        sql_profile: Some(profile),
        ..PolicyConfig::default()
    }
}

fn run(sql: &str, config: &PolicyConfig) -> Result<Vec<StatementType>, AuthorizationError> {
    authorize(&AuthorizationRequest::sql(EXECUTE_QUERY, sql), config).map(|ok| ok.statement_types)
}

#[test]
fn test_profile_hierarchy_is_monotonic() {
    verify_profile_hierarchy().unwrap();

    let probes = [
        "SELECT 1",
        "INSERT INTO t VALUES (1)",
        "UPDATE t SET a = 1",
        "CREATE TABLE t (id INT)",
        "DROP TABLE t",
        "GRANT SELECT ON t TO bob",
    ];
    for pair in GovernanceProfile::HIERARCHY.windows(2) {
        let (lower, upper) = (sql_profile(pair[0]), sql_profile(pair[1]));
        for sql in probes {
            if run(sql, &lower).is_ok() {
                assert!(run(sql, &upper).is_ok(), "{} allows {sql} but {} does not", pair[0], pair[1]);
            }
        }
    }
}

#[test]
fn test_cte_wrapped_insert_is_governed_as_insert() {
    let read_only = sql_profile(GovernanceProfile::ReadOnly);
    assert_eq!(
        run("WITH x AS (SELECT 1) SELECT * FROM x", &read_only).unwrap(),
        vec![StatementType::Select]
    );

    let err = run("WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x", &read_only).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Statement type 'insert' is not allowed. Permitted types: describe, explain, select, show"
    );
}

#[test]
fn test_batch_is_all_or_nothing() {
    let batch = "SELECT 1; INSERT INTO t VALUES (1)";
    assert_eq!(
        run(batch, &sql_profile(GovernanceProfile::Analyst)).unwrap(),
        vec![StatementType::Select, StatementType::Insert]
    );

    let err = run(batch, &sql_profile(GovernanceProfile::ReadOnly)).unwrap_err();
    assert!(matches!(
        err,
        AuthorizationError::Denied(GovernanceDenied::Sql { statement_type: StatementType::Insert, .. })
    ));
}

#[test]
fn test_denied_type_beats_profile() {
    let config = PolicyConfig {
        sql_denied_types: BTreeSet::from([StatementType::Create]),
        ..sql_profile(GovernanceProfile::Developer)
    };
    assert!(run("CREATE TABLE t (id INT)", &config).is_err());
    assert!(run("INSERT INTO t VALUES (1)", &config).is_ok());
}

#[test]
fn test_tool_precedence() {
    let admin_with_deny = PolicyConfig {
        tool_profile: Some(GovernanceProfile::Admin),
        tool_denied: BTreeSet::from(["lakebase_restart_compute".to_string()]),
        ..PolicyConfig::default()
    };
    let err = authorize(&AuthorizationRequest::tool("lakebase_restart_compute"), &admin_with_deny)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Tool 'lakebase_restart_compute' is not permitted by the current governance policy."
    );

    let allow_list = PolicyConfig {
        tool_profile: Some(GovernanceProfile::ReadOnly),
        tool_allowed: BTreeSet::from(["lakebase_create_branch".to_string()]),
        ..PolicyConfig::default()
    };
    assert!(authorize(&AuthorizationRequest::tool("lakebase_create_branch"), &allow_list).is_ok());
}

#[test]
fn test_legacy_equivalence() {
    let locked = PolicyConfig::legacy(false);
    for sql in ["SELECT 1", "SHOW search_path", "EXPLAIN SELECT 1"] {
        assert!(run(sql, &locked).is_ok(), "{sql} should pass in legacy read mode");
    }
    for sql in [
        "INSERT INTO t VALUES (1)",
        "UPDATE t SET a = 1",
        "DELETE FROM t",
        "CREATE TABLE t (id INT)",
        "DROP TABLE t",
        "ALTER TABLE t ADD COLUMN b INT",
    ] {
        let err = run(sql, &locked).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Write operations are disabled. Set WARDEN_ALLOW_WRITE to enable INSERT, UPDATE, DELETE, DDL.",
            "{sql}"
        );
    }

    let open = PolicyConfig::legacy(true);
    for sql in ["SELECT 1", "INSERT INTO t VALUES (1)", "DROP TABLE t"] {
        assert!(run(sql, &open).is_ok());
    }
    for entry in &TOOL_CATALOG {
        assert!(authorize(&AuthorizationRequest::tool(entry.name), &locked).is_ok());
    }
}

#[test]
fn test_unparsable_sql_is_never_allowed() {
    for config in [PolicyConfig::legacy(true), sql_profile(GovernanceProfile::Admin)] {
        let err = run("SELEC * FORM t", &config).unwrap_err();
        assert!(matches!(err, AuthorizationError::Sql(SqlError::Syntax(_))));
    }
    assert!(matches!(
        run("   ", &PolicyConfig::legacy(true)),
        Err(AuthorizationError::Sql(SqlError::Empty))
    ));
}

#[test]
fn test_sql_tool_category_denied_blocks_every_sql_tool() {
    let config = PolicyConfig {
        tool_profile: Some(GovernanceProfile::Admin),
        tool_denied_categories: BTreeSet::from([ToolCategory::SqlQuery]),
        ..PolicyConfig::default()
    };
    for tool_id in ToolCategory::SqlQuery.tools() {
        let err = authorize(&AuthorizationRequest::sql(tool_id, "SELECT 1"), &config).unwrap_err();
        assert!(matches!(err, AuthorizationError::Denied(GovernanceDenied::Tool { .. })));
    }
}

#[test]
fn test_hidden_writes_are_governed_as_writes() {
    let read_only = sql_profile(GovernanceProfile::ReadOnly);
    for sql in [
        "SELECT * INTO newtab FROM t",
        "EXPLAIN (ANALYZE) DELETE FROM t",
        "EXPLAIN (ANALYZE true, BUFFERS) DELETE FROM t",
        "WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d",
    ] {
        assert!(
            matches!(run(sql, &read_only), Err(AuthorizationError::Denied(GovernanceDenied::Sql { .. }))),
            "read_only allowed {sql}"
        );
        assert!(
            matches!(
                run(sql, &PolicyConfig::legacy(false)),
                Err(AuthorizationError::Denied(GovernanceDenied::LegacyWrite { .. }))
            ),
            "legacy read-only mode allowed {sql}"
        );
    }

    let analyst = sql_profile(GovernanceProfile::Analyst);
    let err = run(
        "WITH d AS (UPDATE t SET a = 1 RETURNING *) INSERT INTO x SELECT * FROM d",
        &analyst,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        AuthorizationError::Denied(GovernanceDenied::Sql {
            statement_type: StatementType::Update,
            ..
        })
    ));
}
