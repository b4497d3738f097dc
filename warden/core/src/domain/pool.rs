// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Pool Domain Interface
//!
//! Defines what the pool manager needs from a concrete pool ([`PoolBackend`]),
//! the per-endpoint sizing/retry settings ([`ConnectionPoolConfig`]), and the
//! typed checkout failures callers format for users.
//!
//! The retry policy only ever sees a [`ConnectErrorKind`], never a transport
//! library's error type. Concrete backends live in `crate::infrastructure::db`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    pub min_size: u32,
    pub max_size: u32,
    pub max_lifetime_seconds: u64,
    pub max_idle_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub base_retry_delay_seconds: f64,
    pub max_retry_delay_seconds: f64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 10,
            max_lifetime_seconds: 300,
            max_idle_seconds: 60,
            connect_timeout_seconds: 30,
            retry_attempts: 5,
            base_retry_delay_seconds: 0.5,
            max_retry_delay_seconds: 10.0,
        }
    }
}

impl ConnectionPoolConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_seconds)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_retry_delay_seconds.max(0.0))
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_retry_delay_seconds.max(0.0))
    }

    /// Hard ceiling on one checkout, waiting for a free slot and backoff included.
    pub fn checkout_ceiling(&self) -> Duration {
        self.connect_timeout()
            .saturating_mul(self.retry_attempts.saturating_add(1))
    }
}

/// Backoff bookkeeping for one checkout. Created when the checkout starts and
/// dropped when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far (0 before the first retry).
    pub attempt: u32,
    /// Delay to wait before the next retry.
    pub delay: Duration,
    max_attempts: u32,
    max_delay: Duration,
}

impl RetryState {
    pub fn new(config: &ConnectionPoolConfig) -> Self {
        let max_delay = config.max_retry_delay();
        Self {
            attempt: 0,
            delay: config.base_retry_delay().min(max_delay),
            max_attempts: config.retry_attempts,
            max_delay,
        }
    }

    /// Consumes one retry and returns how long to wait before it, or `None` once
    /// the retry budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let current = self.delay;
        self.attempt += 1;
        self.delay = self.delay.saturating_mul(2).min(self.max_delay);
        Some(current)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Which endpoint a checkout should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Primary,
    PreferReplica,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Primary,
    Replica,
}

impl Endpoint {
    /// Name used as the `<backend>` in user-facing connection messages.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Endpoint::Primary => "Primary database compute",
            Endpoint::Replica => "Read replica compute",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Primary => "primary",
            Endpoint::Replica => "replica",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failed connection attempt should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// Compute is (probably) resuming from suspension; retry with backoff.
    Waking,
    /// Anything else; report immediately.
    Fatal,
    /// The database refused the operation for the connecting role.
    PermissionDenied,
}

/// A single failed acquire, already classified by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AcquireError {
    pub kind: ConnectErrorKind,
    pub message: String,
}

impl AcquireError {
    pub fn waking(message: impl Into<String>) -> Self {
        Self { kind: ConnectErrorKind::Waking, message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { kind: ConnectErrorKind::Fatal, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("{backend} is waking up from scale-to-zero. Retries exhausted.")]
    RetriesExhausted {
        backend: &'static str,
        attempts: u32,
        last_error: String,
    },

    #[error("Cannot connect to {backend}: {message}")]
    Failed {
        backend: &'static str,
        message: String,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl ConnectionError {
    pub fn is_waking(&self) -> bool {
        matches!(self, ConnectionError::RetriesExhausted { .. })
    }
}

/// A concrete pool of connections to one endpoint.
///
/// `acquire` must hand back a connection that has passed a liveness check; the
/// connection returns to the pool when dropped.
#[async_trait]
pub trait PoolBackend: Send + Sync {
    type Connection: Send;

    async fn acquire(&self) -> Result<Self::Connection, AcquireError>;

    async fn close(&self);
}
