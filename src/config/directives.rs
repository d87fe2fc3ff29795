//! Apache-style directive files.
//!
//! Reads the two directives load balancer operators already know:
//!
//! ```text
//! # httpd.conf fragment
//! ZeusEnable On
//! ZeusLoadBalancerIP 10.100.3.23 10.100.3.24
//! ```
//!
//! Directive names are case-insensitive. `ZeusLoadBalancerIP` may repeat and
//! accumulates; the last `ZeusEnable` wins. `ZeusLoadBalancerIP *` trusts every
//! upstream. Addresses are checked here so a bad literal is reported with its
//! line number.

use thiserror::Error;

use crate::config::RealIpConfig;
use crate::trust::store::{parse_ipv4_literal, TRUST_ALL};

pub const ENABLE_DIRECTIVE: &str = "ZeusEnable";
pub const LOAD_BALANCER_IP_DIRECTIVE: &str = "ZeusLoadBalancerIP";

/// Error in a directive file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("line {line}: unknown directive '{name}'")]
    Unknown { line: usize, name: String },

    #[error("line {line}: ZeusEnable takes one argument, 'On' or 'Off'")]
    InvalidFlag { line: usize },

    #[error("line {line}: ZeusLoadBalancerIP takes at least one argument")]
    MissingAddress { line: usize },

    #[error("line {line}: Invalid IP Address '{value}'")]
    InvalidAddress { line: usize, value: String },
}

/// Parse directive text into a `[real_ip]` section.
pub fn parse_directives(text: &str) -> Result<RealIpConfig, DirectiveError> {
    let mut config = RealIpConfig::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or_default();
        let mut words = content.split_whitespace();

        let Some(name) = words.next() else {
            continue;
        };

        if name.eq_ignore_ascii_case(ENABLE_DIRECTIVE) {
            config.enabled = match (words.next(), words.next()) {
                (Some(flag), None) if flag.eq_ignore_ascii_case("on") => true,
                (Some(flag), None) if flag.eq_ignore_ascii_case("off") => false,
                _ => return Err(DirectiveError::InvalidFlag { line }),
            };
        } else if name.eq_ignore_ascii_case(LOAD_BALANCER_IP_DIRECTIVE) {
            let mut any = false;
            for value in words {
                any = true;
                if value != TRUST_ALL && parse_ipv4_literal(value).is_none() {
                    return Err(DirectiveError::InvalidAddress {
                        line,
                        value: value.to_string(),
                    });
                }
                config.load_balancer_ips.push(value.to_string());
            }
            if !any {
                return Err(DirectiveError::MissingAddress { line });
            }
        } else {
            return Err(DirectiveError::Unknown {
                line,
                name: name.to_string(),
            });
        }
    }

    Ok(config)
}
