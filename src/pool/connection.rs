//! Pooled connection handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque reusable handle handed to a service transport.
///
/// The transport may key its own resources (sockets, sessions) on [`id`](Self::id).
#[derive(Debug)]
pub struct PooledConnection {
    id: ConnectionId,
    service: String,
    created_at: Instant,
    last_used: Instant,
    in_use: bool,
    uses: u64,
}

impl PooledConnection {
    pub(crate) fn open(service: &str) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            service: service.to_string(),
            created_at: now,
            last_used: now,
            in_use: false,
            uses: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// Times this handle has been checked out, including the current one.
    pub fn uses(&self) -> u64 {
        self.uses
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn check_out(&mut self) {
        self.in_use = true;
        self.uses += 1;
    }

    pub(crate) fn check_in(&mut self) {
        self.in_use = false;
        self.last_used = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn check_out_and_in_toggle_flag() {
        let mut conn = PooledConnection::open("svc");
        assert!(!conn.in_use());
        conn.check_out();
        assert!(conn.in_use());
        assert_eq!(conn.uses(), 1);
        conn.check_in();
        assert!(!conn.in_use());
        assert_eq!(conn.service(), "svc");
    }
}
