//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, one ConnectionContext per connection)
//!     → middleware.rs (real IP substitution, first)
//!     → request ID, tracing, timeout
//!     → middleware.rs (access log with the effective client)
//!     → handlers.rs
//! ```

pub mod env;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use env::{ClientAddr, RequestEnv, RequestEnvExt};
pub use server::{AppState, HttpServer};
