//! Trusted load balancer addresses.
//!
//! # Responsibilities
//! - Parse configured load balancer literals (IPv4 or `*`)
//! - Answer "is this transport source a trusted proxy?"
//!
//! # Design Decisions
//! - Built once at configuration load, never mutated afterwards
//! - Exact match only, no CIDR ranges
//! - Shared read-only via `Arc`; reload swaps the whole store

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

use crate::config::RealIpConfig;

/// Token that trusts every upstream address.
pub const TRUST_ALL: &str = "*";

/// Error raised while building a [`TrustStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("invalid load balancer address '{0}'")]
    InvalidAddress(String),
}

/// The set of proxies allowed to assert a client address for one server.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    enabled: bool,
    trust_all: bool,
    trusted: HashSet<Ipv4Addr>,
}

impl TrustStore {
    /// A store that never rewrites anything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build a store from the enable flag and the configured literals.
    pub fn new<I, S>(enabled: bool, entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self {
            enabled,
            ..Self::default()
        };

        for entry in entries {
            store.add(entry.as_ref())?;
        }

        Ok(store)
    }

    /// Build a store from the `[real_ip]` configuration section.
    pub fn from_config(config: &RealIpConfig) -> Result<Self, ConfigurationError> {
        Self::new(config.enabled, &config.load_balancer_ips)
    }

    fn add(&mut self, entry: &str) -> Result<(), ConfigurationError> {
        let entry = entry.trim();
        if entry == TRUST_ALL {
            self.trust_all = true;
            return Ok(());
        }

        let addr = parse_ipv4_literal(entry)
            .ok_or_else(|| ConfigurationError::InvalidAddress(entry.to_string()))?;
        self.trusted.insert(addr);
        Ok(())
    }

    /// Whether header substitution runs at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether every source is trusted.
    pub fn trusts_all(&self) -> bool {
        self.trust_all
    }

    /// Number of explicitly configured addresses.
    pub fn len(&self) -> usize {
        self.trusted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Returns true if `addr` may assert a client address on someone's behalf.
    pub fn is_trusted_source(&self, addr: IpAddr) -> bool {
        if self.trust_all {
            return true;
        }

        // Dual-stack listeners report IPv4 peers as `::ffff:a.b.c.d`.
        match addr.to_canonical() {
            IpAddr::V4(v4) => self.trusted.contains(&v4),
            IpAddr::V6(_) => false,
        }
    }
}

/// Parse a strict dotted-decimal IPv4 literal.
pub fn parse_ipv4_literal(literal: &str) -> Option<Ipv4Addr> {
    literal.parse().ok()
}
