//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) and/or directive file (ZeusEnable, ZeusLoadBalancerIP)
//!     → loader.rs (parse & deserialize, merge directives)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → TrustStore built once, shared via Arc
//!
//! On reload:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the server state
//!     → new connections evaluate trust against the new store
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - An invalid load balancer address fails the load, never trusted silently

pub mod directives;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigSource};
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::RealIpConfig;
pub use schema::ServerConfig;
pub use schema::TimeoutConfig;
