//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (real IP first, then request ID, tracing, timeout, access log)
//! - Give every accepted connection its own `ConnectionContext`
//! - Apply configuration updates without dropping connections

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{middleware, routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::handlers::client_report;
use crate::http::middleware::{access_log_middleware, real_ip_middleware};
use crate::net::connection::ConnectionContext;
use crate::trust::{ConfigurationError, TrustStore};

/// Configuration snapshot plus the trust store built from it.
#[derive(Debug)]
pub struct InnerState {
    pub config: ServerConfig,
    pub trust: TrustStore,
}

impl InnerState {
    pub fn new(config: ServerConfig) -> Result<Self, ConfigurationError> {
        let trust = TrustStore::from_config(&config.real_ip)?;
        Ok(Self { config, trust })
    }
}

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<InnerState>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, ConfigurationError> {
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(InnerState::new(config)?)),
        })
    }

    /// Swap in a new configuration.
    ///
    /// Connections that already have a trust verdict keep it; new connections
    /// are judged against the new store. On error the current state is kept.
    pub fn apply(&self, config: ServerConfig) -> Result<(), ConfigurationError> {
        let next = InnerState::new(config)?;
        tracing::info!(
            enabled = next.trust.is_enabled(),
            trust_all = next.trust.trusts_all(),
            load_balancers = next.trust.len(),
            "Trust configuration applied"
        );
        self.inner.store(Arc::new(next));
        Ok(())
    }
}

/// HTTP server that resolves client addresses before anything else runs.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails if a configured load balancer address is invalid.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigurationError> {
        let state = AppState::new(config)?;
        let router = Self::build_router(&state);
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers added last run first.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let request_secs = state.inner.load().config.timeouts.request_secs;

        Router::new()
            .route("/{*path}", any(client_report))
            .route("/", any(client_report))
            .layer(middleware::from_fn(access_log_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::from_fn_with_state(state.clone(), real_ip_middleware))
    }

    /// Shared state, for applying configuration from outside.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A copy of the router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` replace the trust store;
    /// the listener and timeouts stay as they were at startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = state.apply(config) {
                    tracing::error!(error = %e, "Rejected configuration update");
                }
            }
        });

        // One ConnectionContext per accepted connection.
        let app = self
            .router
            .into_make_service_with_connect_info::<ConnectionContext>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn trusted_config(ips: &[&str]) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.real_ip.enabled = true;
        config.real_ip.load_balancer_ips = ips.iter().map(|s| s.to_string()).collect();
        config
    }

    async fn report(router: Router, header: Option<&str>) -> serde_json::Value {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = header {
            builder = builder.header("X-Cluster-Client-Ip", value);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn rejects_invalid_load_balancer() {
        let err = HttpServer::new(trusted_config(&["10.0.0.1", "bogus"])).err();
        assert_eq!(err, Some(ConfigurationError::InvalidAddress("bogus".into())));
    }

    #[tokio::test]
    async fn rewrites_for_trusted_connection() {
        let server = HttpServer::new(trusted_config(&["10.0.0.1"])).unwrap();
        let conn = ConnectionContext::new("10.0.0.1:50000".parse().unwrap());
        let router = server.router().layer(MockConnectInfo(conn));

        let body = report(router, Some("203.0.113.5")).await;
        assert_eq!(body["client_addr"], "203.0.113.5");
        assert_eq!(body["peer_addr"], "10.0.0.1");
        assert_eq!(body["load_balancer_addr"], "10.0.0.1");
        assert_eq!(body["env"]["ZEUS_LOAD_BALANCER_ADDR"], "10.0.0.1");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn reports_connection_from_mock_connect_info() {
        let server = HttpServer::new(trusted_config(&["10.0.0.1"])).unwrap();
        let conn = ConnectionContext::new("10.0.0.2:50000".parse().unwrap());
        let router = server.router().layer(MockConnectInfo(conn.clone()));

        let body = report(router, None).await;
        assert_eq!(body["client_addr"], "10.0.0.2");
        assert_eq!(body["peer_addr"], "10.0.0.2");
        assert_eq!(body["connection_id"], conn.id().as_u64());
        assert_eq!(body["connection_requests"], 1);
        assert_eq!(conn.request_count(), 1);
    }

    #[tokio::test]
    async fn passes_through_without_connection_context() {
        let server = HttpServer::new(trusted_config(&["*"])).unwrap();

        let body = report(server.router(), Some("203.0.113.5")).await;
        assert!(body["client_addr"].is_null());
        assert!(body["load_balancer_addr"].is_null());
    }

    #[tokio::test]
    async fn applied_config_governs_new_connections_only() {
        let server = HttpServer::new(trusted_config(&["10.0.0.1"])).unwrap();
        let existing = ConnectionContext::new("10.0.0.1:50000".parse().unwrap());

        let body = report(server.router().layer(MockConnectInfo(existing.clone())), Some("203.0.113.5")).await;
        assert_eq!(body["client_addr"], "203.0.113.5");

        server.state().apply(trusted_config(&["10.0.0.2"])).unwrap();

        // Verdict already cached for the existing connection.
        let body = report(server.router().layer(MockConnectInfo(existing)), Some("203.0.113.6")).await;
        assert_eq!(body["client_addr"], "203.0.113.6");

        let fresh = ConnectionContext::new("10.0.0.1:50001".parse().unwrap());
        let body = report(server.router().layer(MockConnectInfo(fresh)), Some("203.0.113.7")).await;
        assert_eq!(body["client_addr"], "10.0.0.1");
        assert!(body["load_balancer_addr"].is_null());
    }

    #[tokio::test]
    async fn invalid_update_keeps_current_state() {
        let server = HttpServer::new(trusted_config(&["10.0.0.1"])).unwrap();
        assert!(server.state().apply(trusted_config(&["10.0.0.300"])).is_err());

        let inner = server.state().inner.load();
        assert!(inner.trust.is_trusted_source("10.0.0.1".parse().unwrap()));
    }
}
