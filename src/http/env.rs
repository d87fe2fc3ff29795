//! Request environment side channel.
//!
//! A small string map carried in request extensions so that later stages
//! (access logging, handlers) can read values published by earlier ones,
//! the way CGI-style environment variables are passed along.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::Request;
use serde::Serialize;

/// Environment variables attached to a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestEnv {
    vars: BTreeMap<String, String>,
}

impl RequestEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Extension trait for reaching the environment on a request.
pub trait RequestEnvExt {
    /// The request's environment, if anything has been published.
    fn env(&self) -> Option<&RequestEnv>;

    /// The request's environment, created empty on first use.
    fn env_mut(&mut self) -> &mut RequestEnv;
}

impl<B> RequestEnvExt for Request<B> {
    fn env(&self) -> Option<&RequestEnv> {
        self.extensions().get::<RequestEnv>()
    }

    fn env_mut(&mut self) -> &mut RequestEnv {
        self.extensions_mut().get_or_insert_default::<RequestEnv>()
    }
}

/// Effective client address of a request, as resolved by the real-IP stage.
///
/// Its presence also marks a request as already resolved: a request that is
/// re-dispatched internally carries it along and is not processed twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn env_created_on_first_write() {
        let mut req = Request::new(Body::empty());
        assert!(req.env().is_none());

        req.env_mut().set("ZEUS_LOAD_BALANCER_ADDR", "10.0.0.1");
        req.env_mut().set("OTHER", "x");

        let env = req.env().unwrap();
        assert_eq!(env.get("ZEUS_LOAD_BALANCER_ADDR"), Some("10.0.0.1"));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn set_replaces_value() {
        let mut env = RequestEnv::new();
        env.set("KEY", "one");
        env.set("KEY", "two");
        assert_eq!(env.get("KEY"), Some("two"));
        assert_eq!(env.iter().collect::<Vec<_>>(), vec![("KEY", "two")]);
    }

    #[test]
    fn serializes_as_map() {
        let mut env = RequestEnv::new();
        env.set("ZEUS_LOAD_BALANCER_ADDR", "10.0.0.1");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, serde_json::json!({"ZEUS_LOAD_BALANCER_ADDR": "10.0.0.1"}));
    }
}
