//! Address substitution.
//!
//! # Responsibilities
//! - Read `X-Cluster-Client-Ip` from the request
//! - Consult the connection's trust verdict
//! - Publish the proxy address into the request environment
//! - Replace the effective client address and drop the stale hostname
//!
//! # Design Decisions
//! - Advisory only: every path lets the request continue
//! - Trust is checked before the "already correct" shortcut, so a header that
//!   matches the current address can't skip the trust gate
//! - Identical rewrites are skipped to keep the cached hostname

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderName, Request};

use crate::http::env::{ClientAddr, RequestEnvExt};
use crate::net::connection::ConnectionContext;
use crate::trust::cache::TrustVerdict;
use crate::trust::store::TrustStore;

/// Header a load balancer uses to pass on the original client address.
pub const X_CLUSTER_CLIENT_IP: HeaderName = HeaderName::from_static("x-cluster-client-ip");

/// Environment variable holding the address of the trusted proxy.
pub const LOAD_BALANCER_ADDR_ENV: &str = "ZEUS_LOAD_BALANCER_ADDR";

/// What processing did to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Substitution is switched off for this server.
    Disabled,
    /// The request was already resolved by an enclosing request.
    Inherited,
    /// No client address header was sent.
    NoHeader,
    /// The header was sent over a connection from an untrusted source.
    UntrustedSource,
    /// The header came from a trusted proxy but is not an address.
    MalformedHeader,
    /// The header matches the current effective address.
    Unchanged,
    /// The effective address was replaced.
    Rewritten { from: SocketAddr, to: SocketAddr },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Disabled => "disabled",
            Outcome::Inherited => "inherited",
            Outcome::NoHeader => "no_header",
            Outcome::UntrustedSource => "untrusted_source",
            Outcome::MalformedHeader => "malformed_header",
            Outcome::Unchanged => "unchanged",
            Outcome::Rewritten { .. } => "rewritten",
        }
    }

    /// True if the effective address changed.
    pub fn is_rewrite(&self) -> bool {
        matches!(self, Outcome::Rewritten { .. })
    }
}

/// Result of [`resolve`]: the outcome and the effective client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Effective address as seen while processing. `None` when the request
    /// was already resolved upstream and keeps its own [`ClientAddr`].
    pub client_addr: Option<SocketAddr>,
}

/// Apply the client address header of `request` to `conn`.
///
/// Never fails; problems are logged and the request is left untouched.
pub fn process<B>(store: &TrustStore, conn: &ConnectionContext, request: &mut Request<B>) -> Outcome {
    resolve(store, conn, request).outcome
}

/// Like [`process`], also returning the effective address read under the
/// same lock as any rewrite, so a concurrent request on the connection can't
/// slip in between.
pub fn resolve<B>(store: &TrustStore, conn: &ConnectionContext, request: &mut Request<B>) -> Resolution {
    let current = |outcome| Resolution {
        outcome,
        client_addr: Some(conn.remote_addr()),
    };

    if !store.is_enabled() {
        return current(Outcome::Disabled);
    }

    if request.extensions().get::<ClientAddr>().is_some() {
        return Resolution {
            outcome: Outcome::Inherited,
            client_addr: None,
        };
    }

    let Some(raw) = request.headers().get(&X_CLUSTER_CLIENT_IP) else {
        return current(Outcome::NoHeader);
    };
    let header = String::from_utf8_lossy(raw.as_bytes()).into_owned();

    let proxy = match conn.trust().evaluate(conn.peer_addr().ip(), store) {
        TrustVerdict::Trusted(proxy) => proxy,
        TrustVerdict::Untrusted => {
            tracing::warn!(
                connection_id = %conn.id(),
                header = %header,
                peer_addr = %conn.peer_addr().ip(),
                "Ignoring X-Cluster-Client-Ip from non-load balancer machine"
            );
            return current(Outcome::UntrustedSource);
        }
    };

    request
        .env_mut()
        .set(LOAD_BALANCER_ADDR_ENV, proxy.to_string());

    let mut remote = conn.remote();
    let Some(candidate) = parse_client_addr(&header, remote.addr.port()) else {
        tracing::warn!(
            connection_id = %conn.id(),
            header = %header,
            load_balancer_addr = %proxy,
            "Invalid X-Cluster-Client-Ip header; ignored"
        );
        return Resolution {
            outcome: Outcome::MalformedHeader,
            client_addr: Some(remote.addr),
        };
    };

    if candidate.ip() == remote.addr.ip() {
        return Resolution {
            outcome: Outcome::Unchanged,
            client_addr: Some(remote.addr),
        };
    }

    let from = remote.addr;
    remote.addr = candidate;
    // Force a fresh reverse lookup for the new address.
    remote.host = None;

    tracing::debug!(
        connection_id = %conn.id(),
        from = %from,
        to = %candidate,
        load_balancer_addr = %proxy,
        "Client address replaced"
    );

    Resolution {
        outcome: Outcome::Rewritten { from, to: candidate },
        client_addr: Some(candidate),
    }
}

/// Parse a header value as a client address.
///
/// Accepts `1.2.3.4`, `2001:db8::1`, `[2001:db8::1]` and the same with a
/// `:port` suffix. Without a port, `default_port` is used.
pub fn parse_client_addr(value: &str, default_port: u16) -> Option<SocketAddr> {
    let value = value.trim();

    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr);
    }

    let bare = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);

    bare.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, default_port))
}
