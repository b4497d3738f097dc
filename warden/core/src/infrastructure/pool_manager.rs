// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Connection Pool Manager - Primary/Replica Routing and Scale-to-Zero Retry
//
// Owns the primary pool and an optional read replica pool. Every checkout:
// - routes to the replica when asked and configured, falling back to primary
// - retries waking failures with exponential backoff, capped per endpoint
// - is bounded by connect_timeout x (retry_attempts + 1) overall
//
// Dropping a checkout future cancels any pending backoff; a granted connection
// goes back to its pool when the Checkout is dropped.

use std::ops::{Deref, DerefMut};
use tracing::{info, warn};

use crate::domain::pool::{
    ConnectErrorKind, ConnectionError, ConnectionPoolConfig, Endpoint, PoolBackend, RetryState,
    Route,
};

struct ManagedPool<B> {
    backend: B,
    config: ConnectionPoolConfig,
}

/// A connection checked out from one of the managed pools.
#[derive(Debug)]
pub struct Checkout<C> {
    connection: C,
    endpoint: Endpoint,
}

impl<C> Checkout<C> {
    /// Endpoint that actually served the checkout.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn into_inner(self) -> C {
        self.connection
    }
}

impl<C> Deref for Checkout<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C> DerefMut for Checkout<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

pub struct ConnectionPoolManager<B: PoolBackend> {
    primary: ManagedPool<B>,
    replica: Option<ManagedPool<B>>,
}

impl<B: PoolBackend> ConnectionPoolManager<B> {
    pub fn new(primary: B, config: ConnectionPoolConfig) -> Self {
        Self {
            primary: ManagedPool { backend: primary, config },
            replica: None,
        }
    }

    pub fn with_replica(mut self, replica: B, config: ConnectionPoolConfig) -> Self {
        self.replica = Some(ManagedPool { backend: replica, config });
        self
    }

    pub fn has_replica(&self) -> bool {
        self.replica.is_some()
    }

    pub fn backend(&self, endpoint: Endpoint) -> Option<&B> {
        match endpoint {
            Endpoint::Primary => Some(&self.primary.backend),
            Endpoint::Replica => self.replica.as_ref().map(|pool| &pool.backend),
        }
    }

    /// Check out a connection for `route`.
    ///
    /// `PreferReplica` falls back to primary on any replica failure; without a
    /// replica every route goes to primary.
    pub async fn checkout(&self, route: Route) -> Result<Checkout<B::Connection>, ConnectionError> {
        if route == Route::PreferReplica && self.replica.is_some() {
            match self.checkout_endpoint(Endpoint::Replica).await {
                Ok(checkout) => return Ok(checkout),
                Err(e) => {
                    warn!("Replica checkout failed, falling back to primary: {}", e);
                    metrics::counter!("warden_replica_fallbacks_total").increment(1);
                }
            }
        }
        self.checkout_endpoint(Endpoint::Primary).await
    }

    /// Check out from one specific endpoint, retrying while its compute wakes up.
    pub async fn checkout_endpoint(
        &self,
        endpoint: Endpoint,
    ) -> Result<Checkout<B::Connection>, ConnectionError> {
        let backend_name = endpoint.backend_name();
        let pool = match endpoint {
            Endpoint::Primary => &self.primary,
            Endpoint::Replica => self.replica.as_ref().ok_or_else(|| ConnectionError::Failed {
                backend: backend_name,
                message: "no read replica is configured".to_string(),
            })?,
        };

        let mut retry = RetryState::new(&pool.config);
        let mut last_error = String::new();
        let ceiling = pool.config.checkout_ceiling();

        let outcome = tokio::time::timeout(
            ceiling,
            acquire_with_retry(pool, endpoint, &mut retry, &mut last_error),
        )
        .await;

        match outcome {
            Ok(result) => result.map(|connection| Checkout { connection, endpoint }),
            Err(_) => {
                warn!(
                    "{} checkout exceeded {:?} after {} attempts",
                    backend_name,
                    ceiling,
                    retry.attempt + 1
                );
                Err(ConnectionError::RetriesExhausted {
                    backend: backend_name,
                    attempts: retry.attempt + 1,
                    last_error: if last_error.is_empty() {
                        format!("checkout timed out after {:?}", ceiling)
                    } else {
                        last_error
                    },
                })
            }
        }
    }

    /// Close both pools. Outstanding checkouts finish first.
    pub async fn close(&self) {
        if let Some(replica) = &self.replica {
            replica.backend.close().await;
        }
        self.primary.backend.close().await;
    }
}

async fn acquire_with_retry<B: PoolBackend>(
    pool: &ManagedPool<B>,
    endpoint: Endpoint,
    retry: &mut RetryState,
    last_error: &mut String,
) -> Result<B::Connection, ConnectionError> {
    let backend_name = endpoint.backend_name();

    loop {
        match pool.backend.acquire().await {
            Ok(connection) => {
                if retry.attempt > 0 {
                    info!(
                        "{} connected after {} retries",
                        backend_name, retry.attempt
                    );
                }
                return Ok(connection);
            }
            Err(e) => match e.kind {
                ConnectErrorKind::Fatal => {
                    return Err(ConnectionError::Failed {
                        backend: backend_name,
                        message: e.message,
                    });
                }
                ConnectErrorKind::PermissionDenied => {
                    return Err(ConnectionError::PermissionDenied(e.message));
                }
                ConnectErrorKind::Waking => {
                    let Some(delay) = retry.next_delay() else {
                        warn!(
                            "{} still unavailable after {} attempts: {}",
                            backend_name,
                            retry.attempt + 1,
                            e.message
                        );
                        return Err(ConnectionError::RetriesExhausted {
                            backend: backend_name,
                            attempts: retry.attempt + 1,
                            last_error: e.message,
                        });
                    };

                    warn!(
                        "{} connection failed (attempt {}/{}), retrying in {:?}: {}",
                        backend_name,
                        retry.attempt,
                        retry.max_attempts(),
                        delay,
                        e.message
                    );
                    metrics::counter!("warden_checkout_retries_total", "backend" => endpoint.as_str())
                        .increment(1);
                    *last_error = e.message;
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
}
