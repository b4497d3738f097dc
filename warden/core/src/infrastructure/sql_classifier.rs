// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SQL Statement Classifier
//!
//! Reduces SQL text to one [`StatementType`] per top-level statement using a full
//! PostgreSQL-dialect parse (`sqlparser`). Text is never matched against
//! patterns before parsing: the AST decides.
//!
//! - A CTE prefix is unwrapped, so `WITH x AS (...) INSERT ...` is an INSERT.
//! - A data-modifying CTE under a read-only terminal statement takes the CTE's
//!   write type.
//! - `EXPLAIN ANALYZE <write>` and `EXPLAIN (ANALYZE) <write>` execute the
//!   write, so they take the inner type.
//! - `SELECT ... INTO` creates a table and is tagged `create`.
//! - [`classify_detailed`] also lists CTE writes hidden behind a write terminal.
//! - Anything the parser accepts that is outside the 17 tags is
//!   [`SqlError::Unclassified`], never a permissive default.

use sqlparser::ast::{Query, SetExpr, Statement, UtilityOption};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use crate::domain::statement::{ClassifiedStatement, SqlError, StatementType};

/// Server-administration functions no SQL tool may call.
pub const BLOCKED_FUNCTIONS: &[&str] = &[
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_reload_conf",
];

/// Classify every top-level statement in `sql`, in source order.
pub fn classify(sql: &str) -> Result<Vec<StatementType>, SqlError> {
    Ok(classify_detailed(sql)?
        .into_iter()
        .map(|statement| statement.statement_type)
        .collect())
}

/// Like [`classify`], but also reports the writes of data-modifying CTEs that
/// the top-level tag does not name (`WITH d AS (UPDATE ...) INSERT ...`).
pub fn classify_detailed(sql: &str) -> Result<Vec<ClassifiedStatement>, SqlError> {
    if sql.trim_matches(|c: char| c.is_whitespace() || c == ';').is_empty() {
        return Err(SqlError::Empty);
    }

    let dialect = PostgreSqlDialect {};
    let statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Syntax(e.to_string()))?;
    if statements.is_empty() {
        return Err(SqlError::Empty);
    }

    let classified = statements
        .iter()
        .map(|statement| {
            let mut nested_writes = Vec::new();
            let statement_type = classify_statement(statement, &mut nested_writes)?;
            Ok(ClassifiedStatement {
                statement_type,
                nested_writes,
            })
        })
        .collect::<Result<Vec<_>, SqlError>>()?;

    debug!(statements = classified.len(), classified = ?classified, "Classified SQL");
    Ok(classified)
}

fn classify_statement(
    statement: &Statement,
    nested: &mut Vec<StatementType>,
) -> Result<StatementType, SqlError> {
    let statement_type = match statement {
        Statement::Query(query) => return classify_query(query, nested),
        Statement::Explain {
            analyze,
            options,
            statement: inner,
            ..
        } if *analyze || options.as_deref().is_some_and(analyze_option_enabled) => {
            let inner_type = classify_statement(inner, nested)?;
            if inner_type.is_write() {
                inner_type
            } else {
                StatementType::Explain
            }
        }
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                classify_query(source, nested)?;
            }
            StatementType::Insert
        }
        Statement::Update { .. } => StatementType::Update,
        Statement::Delete { .. } => StatementType::Delete,
        Statement::Merge { .. } => StatementType::Merge,
        Statement::Truncate { .. } => StatementType::Truncate,
        Statement::Grant { .. } => StatementType::Grant,
        Statement::Revoke { .. } => StatementType::Revoke,
        Statement::Call { .. } => StatementType::Call,
        Statement::Use { .. } => StatementType::Use,
        Statement::Drop { .. } => StatementType::Drop,
        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. } => StatementType::Create,
        Statement::AlterTable { .. } => StatementType::Alter,
        // EXPLAIN/DESCRIBE/DESC and the long tail of CREATE/ALTER/SHOW/SET forms
        // render with their leading keyword intact.
        other => return classify_by_keyword(&other.to_string()),
    };
    Ok(statement_type)
}

/// `EXPLAIN (ANALYZE)` and `EXPLAIN (ANALYZE true)` execute the statement;
/// only an explicit false value turns analysis off.
fn analyze_option_enabled(options: &[UtilityOption]) -> bool {
    options.iter().any(|option| {
        option.name.value.eq_ignore_ascii_case("analyze")
            && match &option.arg {
                None => true,
                Some(arg) => {
                    let value = arg.to_string();
                    !matches!(
                        value.trim_matches('\'').to_ascii_lowercase().as_str(),
                        "false" | "off" | "no" | "0"
                    )
                }
            }
    })
}

fn classify_query(query: &Query, nested: &mut Vec<StatementType>) -> Result<StatementType, SqlError> {
    let terminal = classify_set_expr(&query.body, nested)?;

    let mut first_cte_write = None;
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            let cte_type = classify_query(&cte.query, nested)?;
            if cte_type.is_write() {
                nested.push(cte_type);
                first_cte_write.get_or_insert(cte_type);
            }
        }
    }

    if terminal.is_write() {
        Ok(terminal)
    } else {
        Ok(first_cte_write.unwrap_or(terminal))
    }
}

fn classify_set_expr(body: &SetExpr, nested: &mut Vec<StatementType>) -> Result<StatementType, SqlError> {
    match body {
        // SELECT ... INTO creates a table.
        SetExpr::Select(select) if select.into.is_some() => Ok(StatementType::Create),
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(StatementType::Select),
        SetExpr::SetOperation { left, right, .. } => {
            let left = classify_set_expr(left, nested)?;
            let right = classify_set_expr(right, nested)?;
            Ok(if left.is_write() { left } else { right })
        }
        SetExpr::Query(inner) => classify_query(inner, nested),
        SetExpr::Insert(statement) | SetExpr::Update(statement) => {
            classify_statement(statement, nested)
        }
    }
}

/// Map the leading keyword of a parsed node's canonical rendering to a tag.
fn classify_by_keyword(rendered: &str) -> Result<StatementType, SqlError> {
    let keyword = rendered
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    let statement_type = match keyword.as_str() {
        "SELECT" | "VALUES" | "TABLE" => StatementType::Select,
        "INSERT" => StatementType::Insert,
        "UPDATE" => StatementType::Update,
        "DELETE" => StatementType::Delete,
        "CREATE" => StatementType::Create,
        "DROP" => StatementType::Drop,
        "ALTER" => StatementType::Alter,
        "MERGE" => StatementType::Merge,
        "TRUNCATE" => StatementType::Truncate,
        "GRANT" => StatementType::Grant,
        "REVOKE" => StatementType::Revoke,
        "USE" => StatementType::Use,
        "SHOW" => StatementType::Show,
        "DESCRIBE" | "DESC" => StatementType::Describe,
        "EXPLAIN" => StatementType::Explain,
        "SET" | "RESET" => StatementType::Set,
        "CALL" => StatementType::Call,
        _ => return Err(SqlError::Unclassified(truncate(rendered))),
    };
    Ok(statement_type)
}

fn truncate(rendered: &str) -> String {
    const MAX: usize = 80;
    match rendered.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &rendered[..idx]),
        None => rendered.to_string(),
    }
}

/// First blocked function invoked anywhere in `sql`, if any.
///
/// Works on the token stream, so names inside string literals and comments are
/// ignored. Text that fails to tokenize yields `None`; the parse step rejects it.
pub fn find_blocked_function(sql: &str) -> Option<String> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;

    let mut significant = tokens
        .iter()
        .filter(|token| !matches!(token, Token::Whitespace(_)))
        .peekable();

    while let Some(token) = significant.next() {
        if let Token::Word(word) = token {
            let name = word.value.to_ascii_lowercase();
            if BLOCKED_FUNCTIONS.contains(&name.as_str())
                && matches!(significant.peek(), Some(Token::LParen))
            {
                return Some(name);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(sql: &str) -> StatementType {
        let types = classify(sql).unwrap();
        assert_eq!(types.len(), 1, "expected a single statement for {sql}");
        types[0]
    }

    #[test]
    fn test_cte_classifies_by_terminal_statement() {
        assert_eq!(
            classify("WITH x AS (SELECT 1) SELECT * FROM x").unwrap(),
            vec![StatementType::Select]
        );
        assert_eq!(
            classify("WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x").unwrap(),
            vec![StatementType::Insert]
        );
    }

    #[test]
    fn test_data_modifying_cte_is_a_write() {
        assert_eq!(
            one("WITH moved AS (INSERT INTO archive VALUES (1) RETURNING id) SELECT * FROM moved"),
            StatementType::Insert
        );
    }

    #[test]
    fn test_batch_preserves_order() {
        assert_eq!(
            classify("SELECT 1; INSERT INTO t VALUES (1)").unwrap(),
            vec![StatementType::Select, StatementType::Insert]
        );
        assert_eq!(
            classify("UPDATE t SET a = 1; DELETE FROM t; SELECT 2;").unwrap(),
            vec![StatementType::Update, StatementType::Delete, StatementType::Select]
        );
    }

    #[test]
    fn test_common_statements() {
        assert_eq!(one("select * from users where id = 1"), StatementType::Select);
        assert_eq!(one("SELECT 1 UNION SELECT 2"), StatementType::Select);
        assert_eq!(one("CREATE TABLE t (id INT)"), StatementType::Create);
        assert_eq!(one("CREATE INDEX idx ON t (id)"), StatementType::Create);
        assert_eq!(one("DROP TABLE t"), StatementType::Drop);
        assert_eq!(one("ALTER TABLE t ADD COLUMN name TEXT"), StatementType::Alter);
        assert_eq!(one("TRUNCATE TABLE t"), StatementType::Truncate);
        assert_eq!(one("GRANT SELECT ON t TO analyst"), StatementType::Grant);
        assert_eq!(one("REVOKE SELECT ON t FROM analyst"), StatementType::Revoke);
        assert_eq!(one("EXPLAIN SELECT * FROM t"), StatementType::Explain);
        assert_eq!(one("SHOW search_path"), StatementType::Show);
        assert_eq!(one("SET search_path TO public"), StatementType::Set);
        assert_eq!(one("CALL refresh_stats()"), StatementType::Call);
    }

    #[test]
    fn test_explain_analyze_of_write_is_the_write() {
        assert_eq!(one("EXPLAIN ANALYZE DELETE FROM t"), StatementType::Delete);
        assert_eq!(one("EXPLAIN ANALYZE SELECT 1"), StatementType::Explain);
    }

    #[test]
    fn test_explain_option_list_analyze() {
        assert_eq!(one("EXPLAIN (ANALYZE) DELETE FROM t"), StatementType::Delete);
        assert_eq!(one("EXPLAIN (ANALYZE true, BUFFERS) DELETE FROM t"), StatementType::Delete);
        assert_eq!(
            one("EXPLAIN (FORMAT JSON, VERBOSE, ANALYZE, BUFFERS) UPDATE t SET a = 1"),
            StatementType::Update
        );
        assert_eq!(one("EXPLAIN (ANALYZE false) DELETE FROM t"), StatementType::Explain);
        assert_eq!(one("EXPLAIN (FORMAT JSON, VERBOSE) DELETE FROM t"), StatementType::Explain);
    }

    #[test]
    fn test_select_into_creates_a_table() {
        assert_eq!(one("SELECT * INTO newtab FROM t"), StatementType::Create);
        assert!(one("SELECT * INTO newtab FROM t").is_write());
    }

    #[test]
    fn test_cte_writes_behind_a_write_terminal_are_reported() {
        let classified = classify_detailed(
            "WITH d AS (UPDATE t SET a = 1 RETURNING *) INSERT INTO x SELECT * FROM d",
        )
        .unwrap();
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].statement_type, StatementType::Insert);
        assert_eq!(classified[0].nested_writes, vec![StatementType::Update]);
        assert_eq!(
            classified[0].effective_types().collect::<Vec<_>>(),
            vec![StatementType::Insert, StatementType::Update]
        );

        let plain = classify_detailed("WITH x AS (SELECT 1) SELECT * FROM x").unwrap();
        assert!(plain[0].nested_writes.is_empty());
    }

    #[test]
    fn test_syntax_error_is_never_classified() {
        match classify("SELEC * FORM t") {
            Err(SqlError::Syntax(message)) => assert!(!message.is_empty()),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(classify(""), Err(SqlError::Empty));
        assert_eq!(classify("   \n\t "), Err(SqlError::Empty));
        assert_eq!(classify(" ; ;"), Err(SqlError::Empty));
    }

    #[test]
    fn test_unsupported_statement_is_unclassified() {
        assert!(matches!(classify("BEGIN"), Err(SqlError::Unclassified(_))));
        assert!(matches!(
            classify("SELECT 1; COMMIT"),
            Err(SqlError::Unclassified(_))
        ));
    }

    #[test]
    fn test_keyword_fallback() {
        assert_eq!(classify_by_keyword("DESC users"), Ok(StatementType::Describe));
        assert_eq!(classify_by_keyword("  reset role"), Ok(StatementType::Set));
        assert!(classify_by_keyword("VACUUM").is_err());
    }

    #[test]
    fn test_blocked_functions() {
        assert_eq!(
            find_blocked_function("SELECT pg_terminate_backend(pid) FROM pg_stat_activity"),
            Some("pg_terminate_backend".to_string())
        );
        assert_eq!(
            find_blocked_function("select PG_RELOAD_CONF ()"),
            Some("pg_reload_conf".to_string())
        );
        assert_eq!(find_blocked_function("SELECT 'pg_cancel_backend(1)'"), None);
        assert_eq!(find_blocked_function("SELECT 1 -- pg_cancel_backend(1)"), None);
        assert_eq!(find_blocked_function("SELECT * FROM pg_stat_activity"), None);
    }
}
