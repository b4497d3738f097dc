// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Query Service
//!
//! Runs governed SQL end to end: authorize, pick a route from the classified
//! statement types, check out a connection, execute, and render rows as JSON.
//!
//! - Pure reads go to the replica when one is configured and run inside a
//!   `READ ONLY` transaction. Explain-tool requests always do.
//! - Anything containing a write goes to primary.
//! - Every statement is tagged `/* pg_warden:<tool> */` so it can be traced in
//!   `pg_stat_activity`.
//! - At most `max_rows` rows are returned; the rest of the result is drained.

use futures::TryStreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Either, Row, TypeInfo};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::policy::{AuthorizationRequest, PolicyEngine};
use crate::domain::governance::verify_profile_hierarchy;
use crate::domain::policy::AuthorizationError;
use crate::domain::pool::{ConnectErrorKind, ConnectionError, Endpoint, Route};
use crate::domain::statement::StatementType;
use crate::domain::warden_config::WardenConfigManifest;
use crate::infrastructure::db::{classify_sqlstate, PgPoolBackend};
use crate::infrastructure::pool_manager::ConnectionPoolManager;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The database refused the statement for the connecting role.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Tool '{0}' does not run SQL")]
    NotSqlTool(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if let Some(code) = db.code() {
                if classify_sqlstate(&code) == ConnectErrorKind::PermissionDenied {
                    return QueryError::PermissionDenied(db.message().to_string());
                }
            }
        }
        QueryError::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub endpoint: Endpoint,
    pub statement_types: Vec<StatementType>,
    /// Result rows, or a single `{"affected_rows": n}` object for writes that
    /// return no rows.
    pub rows: Vec<Value>,
    /// More rows were available than `max_rows`.
    pub truncated: bool,
}

pub fn tag_sql(tool_id: &str, sql: &str) -> String {
    format!("/* pg_warden:{} */ {}", tool_id, sql)
}

const READ_ONLY_TRANSACTION: &str = "SET TRANSACTION READ ONLY";

/// Everything decided about a query before a connection is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Tagged SQL, exactly as it will be sent.
    pub sql: String,
    pub statement_types: Vec<StatementType>,
    pub route: Route,
    pub read_only: bool,
    pub limit: usize,
}

/// Authorize `request` and decide route, transaction mode and row limit.
///
/// `requested_rows` can lower the configured cap but never raise it.
pub fn plan_query(
    engine: &PolicyEngine,
    request: &AuthorizationRequest<'_>,
    max_rows: u32,
    requested_rows: Option<u32>,
) -> Result<QueryPlan, QueryError> {
    let authorized = engine.authorize(request)?;
    let route = authorized.route();
    let statement = authorized
        .statement
        .ok_or_else(|| QueryError::NotSqlTool(request.tool_id.to_string()))?;

    Ok(QueryPlan {
        sql: tag_sql(request.tool_id, &statement),
        statement_types: authorized.statement_types,
        route,
        read_only: authorized.read_only,
        limit: requested_rows.unwrap_or(max_rows).min(max_rows) as usize,
    })
}

/// Accumulates one batch's results up to a row limit.
#[derive(Debug)]
struct BatchCollector {
    rows: Vec<Value>,
    rows_affected: u64,
    truncated: bool,
    limit: usize,
}

impl BatchCollector {
    fn new(limit: usize) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected: 0,
            truncated: false,
            limit,
        }
    }

    fn command_completed(&mut self, rows_affected: u64) {
        self.rows_affected += rows_affected;
    }

    fn row(&mut self, render: impl FnOnce() -> Value) {
        if self.rows.len() < self.limit {
            self.rows.push(render());
        } else {
            self.truncated = true;
        }
    }

    /// Rows for the caller. A write that returned nothing reports its row count.
    fn finish(self, read_only: bool) -> (Vec<Value>, bool) {
        if self.rows.is_empty() && !read_only {
            (vec![serde_json::json!({ "affected_rows": self.rows_affected })], self.truncated)
        } else {
            (self.rows, self.truncated)
        }
    }
}

pub struct QueryService {
    engine: PolicyEngine,
    pools: Arc<ConnectionPoolManager<PgPoolBackend>>,
    max_rows: u32,
}

impl QueryService {
    pub fn new(
        engine: PolicyEngine,
        pools: Arc<ConnectionPoolManager<PgPoolBackend>>,
        max_rows: u32,
    ) -> Self {
        Self { engine, pools, max_rows }
    }

    /// Build the engine and lazy pools from a validated manifest. No connection
    /// is opened here, so a suspended compute does not block startup.
    pub fn initialize(manifest: &WardenConfigManifest) -> anyhow::Result<Self> {
        verify_profile_hierarchy()?;
        let engine = PolicyEngine::new(Arc::new(manifest.resolve_policy()?));

        let database = &manifest.spec.database;
        let primary_config = manifest.pool_config(Endpoint::Primary);
        let primary =
            PgPoolBackend::connect_lazy(Endpoint::Primary, &database.primary, &primary_config)?;
        let mut pools = ConnectionPoolManager::new(primary, primary_config);

        if let Some(replica_endpoint) = &database.replica {
            let replica_config = manifest.pool_config(Endpoint::Replica);
            let replica =
                PgPoolBackend::connect_lazy(Endpoint::Replica, replica_endpoint, &replica_config)?;
            pools = pools.with_replica(replica, replica_config);
        }

        info!(
            replica = pools.has_replica(),
            max_rows = database.max_rows,
            "Query service initialized"
        );
        Ok(Self::new(engine, Arc::new(pools), database.max_rows))
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn pools(&self) -> &ConnectionPoolManager<PgPoolBackend> {
        &self.pools
    }

    /// Authorize and run `sql` on behalf of `tool_id`.
    pub async fn execute(
        &self,
        tool_id: &str,
        sql: &str,
        max_rows: Option<u32>,
    ) -> Result<QueryOutcome, QueryError> {
        self.run(&AuthorizationRequest::sql(tool_id, sql), max_rows).await
    }

    /// Return the JSON plan for `sql` through the explain tool. Never writes.
    pub async fn explain(&self, sql: &str, analyze: bool) -> Result<QueryOutcome, QueryError> {
        self.run(&AuthorizationRequest::explain(sql, analyze), None).await
    }

    pub async fn run(
        &self,
        request: &AuthorizationRequest<'_>,
        max_rows: Option<u32>,
    ) -> Result<QueryOutcome, QueryError> {
        let plan = plan_query(&self.engine, request, self.max_rows, max_rows)?;

        let mut checkout = self.pools.checkout(plan.route).await?;
        let endpoint = checkout.endpoint();
        let conn: &mut PgConnection = &mut checkout;

        debug!(tool = request.tool_id, endpoint = %endpoint, read_only = plan.read_only, "Executing query");
        let batch = if plan.read_only {
            let mut tx = conn.begin().await?;
            sqlx::raw_sql(READ_ONLY_TRANSACTION).execute(&mut *tx).await?;
            let batch = run_batch(&mut tx, &plan.sql, plan.limit).await?;
            tx.commit().await?;
            batch
        } else {
            run_batch(conn, &plan.sql, plan.limit).await?
        };

        let (rows, truncated) = batch.finish(plan.read_only);
        Ok(QueryOutcome {
            endpoint,
            statement_types: plan.statement_types,
            rows,
            truncated,
        })
    }

    /// Check out a connection from `endpoint` and run `SELECT 1`.
    pub async fn ping(&self, endpoint: Endpoint) -> Result<Duration, QueryError> {
        let started = Instant::now();
        let mut checkout = self.pools.checkout_endpoint(endpoint).await?;
        let conn: &mut PgConnection = &mut checkout;
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(conn).await?;
        Ok(started.elapsed())
    }

    pub async fn close(&self) {
        self.pools.close().await;
    }
}

async fn run_batch(
    conn: &mut PgConnection,
    sql: &str,
    limit: usize,
) -> Result<BatchCollector, sqlx::Error> {
    let mut batch = BatchCollector::new(limit);

    let mut stream = sqlx::raw_sql(sql).fetch_many(conn);
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(result) => batch.command_completed(result.rows_affected()),
            Either::Right(row) => batch.row(|| row_to_json(&row)),
        }
    }
    Ok(batch)
}

/// Render one row as a JSON object keyed by column name.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut object = Map::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), column_value(row, idx, column.type_info().name()));
    }
    Value::Object(object)
}

fn column_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<Option<T>>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(idx).ok()
    }

    let typed = match type_name {
        "BOOL" => get::<bool>(row, idx).map(|v| v.map(Value::from)),
        "INT2" => get::<i16>(row, idx).map(|v| v.map(Value::from)),
        "INT4" => get::<i32>(row, idx).map(|v| v.map(Value::from)),
        "INT8" => get::<i64>(row, idx).map(|v| v.map(Value::from)),
        "FLOAT4" => get::<f32>(row, idx).map(|v| v.map(Value::from)),
        "FLOAT8" => get::<f64>(row, idx).map(|v| v.map(Value::from)),
        "JSON" | "JSONB" => get::<Value>(row, idx),
        "UUID" => get::<uuid::Uuid>(row, idx).map(|v| v.map(|u| Value::from(u.to_string()))),
        "TIMESTAMPTZ" => get::<chrono::DateTime<chrono::Utc>>(row, idx)
            .map(|v| v.map(|t| Value::from(t.to_rfc3339()))),
        "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, idx)
            .map(|v| v.map(|t| Value::from(t.to_string()))),
        "DATE" => get::<chrono::NaiveDate>(row, idx).map(|v| v.map(|d| Value::from(d.to_string()))),
        _ => None,
    };

    match typed {
        Some(value) => value.unwrap_or(Value::Null),
        // Simple-protocol results arrive as text; anything unmapped is shown as such.
        None => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}
