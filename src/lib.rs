//! Client address substitution behind a trusted load balancer.
//!
//! A load balancer in front of the server opens the TCP connections itself and
//! passes the original client address in `X-Cluster-Client-Ip`. This crate
//! decides, once per connection, whether the connection's peer is a configured
//! load balancer, and if so replaces the client address of each request with
//! the header value. The load balancer's own address is kept in the request
//! environment as `ZEUS_LOAD_BALANCER_ADDR`.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod trust;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use net::connection::ConnectionContext;
pub use trust::TrustStore;
