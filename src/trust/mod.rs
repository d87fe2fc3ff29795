//! Client address trust.
//!
//! # Data Flow
//! ```text
//! request on connection
//!     → engine.rs (header present? module enabled?)
//!     → cache.rs (connection verdict, computed once from the peer address)
//!     → store.rs (is the peer a configured load balancer?)
//!     → engine.rs (publish proxy address, parse header, rewrite address)
//! ```
//!
//! # Design Decisions
//! - Verdict lives on the connection, never in process-wide state
//! - The store is immutable; reload replaces it wholesale
//! - Request-time problems are logged, never turned into request failures

pub mod cache;
pub mod engine;
pub mod store;

pub use cache::{ConnectionTrustState, TrustVerdict};
pub use engine::{process, resolve, Outcome, Resolution, LOAD_BALANCER_ADDR_ENV, X_CLUSTER_CLIENT_IP};
pub use store::{ConfigurationError, TrustStore};
