// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pools
//!
//! Wraps `sqlx::postgres::PgPool` in [`PgPoolBackend`], the concrete
//! [`PoolBackend`] the pool manager drives for each endpoint.
//!
//! Connection lifecycle is delegated to sqlx:
//! - `max_lifetime` retires aged connections on their next release
//! - `idle_timeout` evicts idle connections above `min_connections`
//! - `test_before_acquire` pings every connection before handing it out and
//!   replaces dead ones transparently
//!
//! Pools are created lazily so a suspended compute does not block startup.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::io::ErrorKind;

use crate::domain::pool::{AcquireError, ConnectErrorKind, ConnectionPoolConfig, Endpoint, PoolBackend};
use crate::domain::warden_config::EndpointConfig;

const APPLICATION_NAME: &str = "pg-warden";

/// Pool options for one endpoint, taken straight from its settings.
pub fn pool_options(config: &ConnectionPoolConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(config.min_size)
        .max_connections(config.max_size)
        .max_lifetime(config.max_lifetime())
        .idle_timeout(config.max_idle())
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(true)
}

pub fn connect_options(endpoint: &EndpointConfig) -> anyhow::Result<PgConnectOptions> {
    let mut options = PgConnectOptions::new()
        .host(&endpoint.host)
        .port(endpoint.port)
        .application_name(APPLICATION_NAME);

    if !endpoint.database.is_empty() {
        options = options.database(&endpoint.database);
    }
    if let Some(user) = &endpoint.user {
        options = options.username(user);
    }
    if let Some(password) = endpoint.resolve_password()? {
        options = options.password(&password);
    }
    Ok(options)
}

/// Decide whether a connect failure looks like compute resuming from suspension.
pub fn classify_connect_error(error: &sqlx::Error) -> ConnectErrorKind {
    match error {
        sqlx::Error::Io(io) => match io.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::TimedOut
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => ConnectErrorKind::Waking,
            _ => ConnectErrorKind::Fatal,
        },
        sqlx::Error::PoolTimedOut => ConnectErrorKind::Waking,
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => classify_sqlstate(&code),
            None => ConnectErrorKind::Fatal,
        },
        _ => ConnectErrorKind::Fatal,
    }
}

/// SQLSTATE classification: connection exceptions (class 08) and
/// `cannot_connect_now` (57P03) mean the server is starting.
pub fn classify_sqlstate(code: &str) -> ConnectErrorKind {
    match code {
        "57P03" => ConnectErrorKind::Waking,
        "42501" => ConnectErrorKind::PermissionDenied,
        c if c.starts_with("08") => ConnectErrorKind::Waking,
        _ => ConnectErrorKind::Fatal,
    }
}

#[derive(Clone, Debug)]
pub struct PgPoolBackend {
    pool: PgPool,
    endpoint: Endpoint,
}

impl PgPoolBackend {
    /// Build the pool without opening any connection yet.
    pub fn connect_lazy(
        endpoint: Endpoint,
        endpoint_config: &EndpointConfig,
        pool_config: &ConnectionPoolConfig,
    ) -> anyhow::Result<Self> {
        let options = connect_options(endpoint_config)?;
        let pool = pool_options(pool_config).connect_lazy_with(options);

        tracing::info!(
            endpoint = %endpoint,
            host = %endpoint_config.host,
            port = endpoint_config.port,
            min = pool_config.min_size,
            max = pool_config.max_size,
            "Created connection pool"
        );
        Ok(Self { pool, endpoint })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PoolBackend for PgPoolBackend {
    type Connection = PoolConnection<Postgres>;

    async fn acquire(&self) -> Result<Self::Connection, AcquireError> {
        self.pool.acquire().await.map_err(|e| AcquireError {
            kind: classify_connect_error(&e),
            message: e.to_string(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!(endpoint = %self.endpoint, "Closed connection pool");
    }
}
