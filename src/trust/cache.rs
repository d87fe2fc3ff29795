//! Per-connection trust verdict.
//!
//! The transport source of a connection cannot change while it is open, so the
//! trust decision is made on the first request that needs it and reused for
//! every keep-alive or multiplexed request that follows.

use std::net::IpAddr;
use std::sync::OnceLock;

use crate::observability::metrics;
use crate::trust::store::TrustStore;

/// Result of checking a connection's transport source against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustVerdict {
    /// The connection came from a trusted proxy at this address.
    Trusted(IpAddr),
    /// The connection did not come from a trusted proxy.
    Untrusted,
}

impl TrustVerdict {
    pub fn is_trusted(&self) -> bool {
        matches!(self, TrustVerdict::Trusted(_))
    }

    /// Address of the proxy that opened the connection, if trusted.
    pub fn proxy_addr(&self) -> Option<IpAddr> {
        match self {
            TrustVerdict::Trusted(addr) => Some(*addr),
            TrustVerdict::Untrusted => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustVerdict::Trusted(_) => "trusted",
            TrustVerdict::Untrusted => "untrusted",
        }
    }
}

/// Write-once trust state owned by a single connection.
///
/// An empty cell means the verdict is still unknown.
#[derive(Debug, Default)]
pub struct ConnectionTrustState {
    verdict: OnceLock<TrustVerdict>,
}

impl ConnectionTrustState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached verdict, or `None` if no request has needed it yet.
    pub fn verdict(&self) -> Option<TrustVerdict> {
        self.verdict.get().copied()
    }

    /// Return the cached verdict, computing it from `source` on first use.
    ///
    /// `source` must be the transport-level peer address, never an address
    /// taken from a header. Once set the verdict is never recomputed, even if
    /// a later call passes a different source or a different store.
    pub fn evaluate(&self, source: IpAddr, store: &TrustStore) -> TrustVerdict {
        *self.verdict.get_or_init(|| {
            let verdict = if store.is_trusted_source(source) {
                // Record the proxy the way it was configured, not IPv4-mapped.
                TrustVerdict::Trusted(source.to_canonical())
            } else {
                TrustVerdict::Untrusted
            };

            tracing::debug!(
                source = %source,
                verdict = verdict.as_str(),
                "Connection trust evaluated"
            );
            metrics::record_verdict(&verdict);
            verdict
        })
    }
}
