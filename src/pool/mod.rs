//! Per-service connection pool.
//!
//! # Responsibilities
//! - Bound the number of handles in use for one service
//! - Reuse released handles; discard those idle beyond `max_idle`
//! - Suspend callers while the pool is at capacity, up to `acquire_timeout`
//!
//! # Design Decisions
//! - A tokio `Semaphore` bounds checkouts; waiting is a genuine async suspension
//! - The checkout is an RAII guard: every exit path (error, deadline, panic) releases it
//! - Idle list is LIFO so the warmest handle is reused first
//!
//! # Data Flow
//! ```text
//! acquire()
//!     → wait for a permit (≤ acquire_timeout, else PoolExhausted)
//!     → prune stale idle handles, reuse newest or open a new one
//!     → PoolGuard (derefs to PooledConnection)
//! drop(PoolGuard)
//!     → release(): handle back on the idle list, permit returned
//! ```

mod connection;

pub use connection::{ConnectionId, PooledConnection};

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::error::{Failure, FailureKind};

/// Point-in-time pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_size: usize,
    pub in_use: usize,
    pub idle: usize,
    /// Handles opened over the pool's lifetime.
    pub created: u64,
    /// Checkouts served from the idle list.
    pub reused: u64,
    /// Idle handles dropped for exceeding `max_idle`.
    pub discarded: u64,
}

/// Bounded pool of reusable handles for one service.
#[derive(Debug)]
pub struct ConnectionPool {
    service: String,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<PooledConnection>>,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

impl ConnectionPool {
    pub fn new(service: impl Into<String>, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            service: service.into(),
            permits: Arc::new(Semaphore::new(config.max_size.max(1))),
            config,
            idle: Mutex::new(VecDeque::new()),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Check out a handle, waiting up to the configured acquire timeout.
    pub async fn acquire(self: &Arc<Self>) -> Result<PoolGuard, Failure> {
        let timeout = self.config.acquire_timeout();
        let permit = match tokio::time::timeout(timeout, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(Failure::new(
                    FailureKind::PoolExhausted,
                    format!("pool for service '{}' is closed", self.service),
                ));
            }
            Err(_elapsed) => {
                tracing::warn!(
                    service = %self.service,
                    max_size = self.config.max_size,
                    timeout = ?timeout,
                    "Connection pool exhausted"
                );
                return Err(Failure::rejected(FailureKind::PoolExhausted, &self.service));
            }
        };

        let mut conn = self.take_idle().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            PooledConnection::open(&self.service)
        });
        conn.check_out();
        tracing::trace!(service = %self.service, connection_id = %conn.id(), "Connection checked out");

        Ok(PoolGuard {
            pool: Arc::clone(self),
            conn: Some(conn),
            _permit: permit,
        })
    }

    /// Return a handle to the idle list.
    pub fn release(&self, mut conn: PooledConnection) {
        conn.check_in();
        tracing::trace!(service = %self.service, connection_id = %conn.id(), "Connection released");
        self.idle.lock().push_back(conn);
    }

    pub fn stats(&self) -> PoolStats {
        let max_size = self.config.max_size.max(1);
        PoolStats {
            max_size,
            in_use: max_size.saturating_sub(self.permits.available_permits()),
            idle: self.idle.lock().len(),
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn take_idle(&self) -> Option<PooledConnection> {
        let max_idle = self.config.max_idle();
        let mut idle = self.idle.lock();

        // Oldest handles sit at the front.
        while idle.front().is_some_and(|c| c.idle_for() > max_idle) {
            if let Some(stale) = idle.pop_front() {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    service = %self.service,
                    connection_id = %stale.id(),
                    idle_for = ?stale.idle_for(),
                    "Discarding stale connection"
                );
            }
        }

        let conn = idle.pop_back()?;
        self.reused.fetch_add(1, Ordering::Relaxed);
        Some(conn)
    }
}

/// Checked-out handle. Returned to the pool on drop.
#[derive(Debug)]
pub struct PoolGuard {
    pool: Arc<ConnectionPool>,
    conn: Option<PooledConnection>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PoolGuard {
    type Target = PooledConnection;

    fn deref(&self) -> &PooledConnection {
        match &self.conn {
            Some(conn) => conn,
            // Only taken in Drop.
            None => unreachable!("pool guard used after release"),
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
