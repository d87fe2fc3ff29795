//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → axum accept loop
//!     → connection.rs (ConnectionContext: ID, peer, trust verdict, effective address)
//!     → Handed to every request on the connection
//! ```

pub mod connection;
