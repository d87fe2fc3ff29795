//! Request handlers.

use axum::{
    body::Body,
    extract::{rejection::ExtensionRejection, ConnectInfo},
    http::Request,
    Json,
};
use serde::Serialize;

use crate::http::env::{ClientAddr, RequestEnv, RequestEnvExt};
use crate::net::connection::ConnectionContext;
use crate::trust::LOAD_BALANCER_ADDR_ENV;

/// What the server knows about the client of a request.
#[derive(Debug, Serialize)]
pub struct ClientReport {
    /// Effective client address.
    pub client_addr: Option<String>,
    /// Transport-level peer, i.e. the load balancer when one is in front.
    pub peer_addr: Option<String>,
    /// Cached reverse-DNS name, if something has resolved one.
    pub remote_host: Option<String>,
    pub load_balancer_addr: Option<String>,
    pub connection_id: Option<u64>,
    /// Requests served on this connection so far, this one included.
    pub connection_requests: Option<u64>,
    pub request_id: Option<String>,
    pub env: RequestEnv,
}

/// Report the request's client addresses as JSON.
pub async fn client_report(
    conn: Result<ConnectInfo<ConnectionContext>, ExtensionRejection>,
    request: Request<Body>,
) -> Json<ClientReport> {
    let conn = conn.ok().map(|ConnectInfo(conn)| conn);
    let conn = conn.as_ref();
    let env = request.env().cloned().unwrap_or_default();

    Json(ClientReport {
        client_addr: request
            .extensions()
            .get::<ClientAddr>()
            .map(|ClientAddr(addr)| addr.ip().to_string()),
        peer_addr: conn.map(|c| c.peer_addr().ip().to_string()),
        remote_host: conn.and_then(|c| c.remote_host()),
        load_balancer_addr: env.get(LOAD_BALANCER_ADDR_ENV).map(str::to_string),
        connection_id: conn.map(|c| c.id().as_u64()),
        connection_requests: conn.map(|c| c.request_count()),
        request_id: request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        env,
    })
}
