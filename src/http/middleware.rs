//! Request middleware.
//!
//! `real_ip_middleware` must be the outermost layer so that every later stage
//! (request IDs, tracing, access logging, handlers) sees the effective client
//! address. `access_log_middleware` is one such later stage.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::ExtensionRejection, ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::env::{ClientAddr, RequestEnvExt};
use crate::http::server::AppState;
use crate::net::connection::ConnectionContext;
use crate::observability::metrics;
use crate::trust::{self, LOAD_BALANCER_ADDR_ENV};

/// Apply `X-Cluster-Client-Ip` before anything else looks at the client.
///
/// Always passes the request on. Afterwards the request carries a
/// [`ClientAddr`] and a `ConnectInfo<SocketAddr>` holding the effective
/// address, so stock axum extractors downstream see the real client.
pub async fn real_ip_middleware(
    State(state): State<AppState>,
    conn: Result<ConnectInfo<ConnectionContext>, ExtensionRejection>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Ok(ConnectInfo(conn)) = conn else {
        tracing::debug!("No connection context, client address left as is");
        return next.run(request).await;
    };

    let previous = conn.begin_request();
    let resolution = {
        let inner = state.inner.load();
        trust::resolve(&inner.trust, &conn, &mut request)
    };
    metrics::record_outcome(&resolution.outcome);

    tracing::trace!(
        connection_id = %conn.id(),
        keepalives = previous,
        outcome = resolution.outcome.as_str(),
        "Client address processed"
    );

    if let Some(addr) = resolution.client_addr {
        request.extensions_mut().insert(ClientAddr(addr));
        request.extensions_mut().insert(ConnectInfo(addr));
    }
    // Handlers find the context even when it came from `MockConnectInfo`.
    request.extensions_mut().insert(ConnectInfo(conn));

    next.run(request).await
}

/// Log one line per completed request with the effective client address.
pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ClientAddr>()
        .map(|ClientAddr(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let load_balancer = request
        .env()
        .and_then(|env| env.get(LOAD_BALANCER_ADDR_ENV))
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    tracing::info!(
        client_addr = %client,
        load_balancer_addr = %load_balancer,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
