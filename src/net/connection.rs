//! Per-connection context.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Own the connection's trust verdict and effective client address
//! - Hand the same state to every request on the connection
//!
//! # Design Decisions
//! - Created by axum's connect-info hook once per accepted TCP connection
//! - Shared with requests through an `Arc`; dropped with the connection
//! - Nothing here is process-global except the ID counter

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use tokio::net::TcpListener;

use crate::observability::metrics;
use crate::trust::cache::ConnectionTrustState;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The client address a connection currently reports, plus its cached
/// reverse-DNS name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    pub addr: SocketAddr,
    pub host: Option<String>,
}

#[derive(Debug)]
struct Inner {
    id: ConnectionId,
    peer_addr: SocketAddr,
    trust: ConnectionTrustState,
    remote: Mutex<RemoteAddress>,
    requests: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        metrics::record_connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// State shared by every request on one connection.
///
/// Cloning is cheap and yields a handle to the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    inner: Arc<Inner>,
}

impl ConnectionContext {
    /// Create context for a freshly accepted connection from `peer_addr`.
    pub fn new(peer_addr: SocketAddr) -> Self {
        let id = ConnectionId::new();
        metrics::record_connection_opened();
        tracing::trace!(connection_id = %id, peer_addr = %peer_addr, "Connection opened");

        Self {
            inner: Arc::new(Inner {
                id,
                peer_addr,
                trust: ConnectionTrustState::new(),
                remote: Mutex::new(RemoteAddress {
                    addr: peer_addr,
                    host: None,
                }),
                requests: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Transport-level source address. Never changes.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    pub fn trust(&self) -> &ConnectionTrustState {
        &self.inner.trust
    }

    /// Effective client address after any substitution.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote().addr
    }

    /// Cached reverse-DNS name of the effective client address.
    pub fn remote_host(&self) -> Option<String> {
        self.remote().host.clone()
    }

    /// Cache a resolved hostname for the current effective address.
    pub fn set_remote_host(&self, host: impl Into<String>) {
        self.remote().host = Some(host.into());
    }

    /// Lock the effective address for a compare-and-replace.
    pub fn remote(&self) -> MutexGuard<'_, RemoteAddress> {
        // The guarded data is always left consistent, so a poisoned lock is still usable.
        self.inner
            .remote
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a request on this connection, returning how many came before it.
    pub fn begin_request(&self) -> u64 {
        self.inner.requests.fetch_add(1, Ordering::Relaxed)
    }

    /// Requests seen so far on this connection.
    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }
}

impl Connected<IncomingStream<'_, TcpListener>> for ConnectionContext {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self::new(*stream.remote_addr())
    }
}
