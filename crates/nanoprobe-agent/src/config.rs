//! [`ConfigContext`]: a JSON-backed key/value configuration store.
//!
//! Grounded in the original's `configcontext.h`, a `GHashTable`-backed store
//! used to carry startup parameters (deadtime, bind address, discovery
//! intervals) between the bootstrap handshake and the running agent. This
//! rewrite keeps a `serde_json::Map` as the backing store — it already
//! round-trips the string/int/bool value shapes the original needs — behind
//! typed accessors so callers don't sprinkle `serde_json::Value` matching
//! through the rest of the crate.

use std::net::Ipv4Addr;
use std::path::Path;

use nanoprobe_proto::NetAddr;
use serde_json::{Map, Value};

use crate::error::AgentError;

/// A JSON object of configuration keys to string/int/bool-shaped values,
/// loaded from a file and overridable by CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigContext {
    values: Map<String, Value>,
}

impl ConfigContext {
    /// An empty config context.
    #[must_use]
    pub fn new() -> Self {
        ConfigContext { values: Map::new() }
    }

    /// Loads a config context from a JSON file on disk.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| AgentError::Io { path: path.display().to_string(), source })?;
        let values: Map<String, Value> =
            serde_json::from_str(&text).map_err(|e| AgentError::Config(e.to_string()))?;
        Ok(ConfigContext { values })
    }

    /// Sets (or overwrites) a string-valued key, for CLI-flag overrides.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    /// Sets (or overwrites) an integer-valued key.
    pub fn set_u64(&mut self, key: impl Into<String>, value: u64) {
        self.values.insert(key.into(), Value::Number(value.into()));
    }

    /// Reads a string-valued key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Reads a string-valued key, falling back to `default` if absent.
    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Reads an unsigned-integer-valued key.
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    /// Reads an unsigned-integer-valued key, falling back to `default` if
    /// absent.
    #[must_use]
    pub fn get_u64_or(&self, key: &str, default: u64) -> u64 {
        self.get_u64(key).unwrap_or(default)
    }

    /// Reads a boolean-valued key.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Reads an `"ip:port"`-shaped string key as an IPv4 [`NetAddr`].
    pub fn get_netaddr(&self, key: &str) -> Result<Option<NetAddr>, AgentError> {
        let Some(raw) = self.get_str(key) else { return Ok(None) };
        let (ip_str, port_str) =
            raw.split_once(':').ok_or_else(|| AgentError::Config(format!("{key}: expected ip:port, got {raw}")))?;
        let ip: Ipv4Addr =
            ip_str.parse().map_err(|_| AgentError::Config(format!("{key}: invalid IPv4 address {ip_str}")))?;
        let port: u16 =
            port_str.parse().map_err(|_| AgentError::Config(format!("{key}: invalid port {port_str}")))?;
        Ok(Some(NetAddr::V4(ip, port)))
    }

    /// Same as [`ConfigContext::get_str`] but fails with
    /// [`AgentError::MissingConfigKey`] instead of returning `None`.
    pub fn require_str(&self, key: &str) -> Result<&str, AgentError> {
        self.get_str(key).ok_or_else(|| AgentError::MissingConfigKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut ctx = ConfigContext::new();
        ctx.set_str("nodename", "host1");
        ctx.set_u64("deadtime_us", 3_000_000);
        assert_eq!(ctx.get_str("nodename"), Some("host1"));
        assert_eq!(ctx.get_u64("deadtime_us"), Some(3_000_000));
    }

    #[test]
    fn missing_key_uses_default() {
        let ctx = ConfigContext::new();
        assert_eq!(ctx.get_u64_or("deadtime_us", 3_000_000), 3_000_000);
    }

    #[test]
    fn require_str_fails_loudly_on_missing_key() {
        let ctx = ConfigContext::new();
        assert!(matches!(ctx.require_str("cma"), Err(AgentError::MissingConfigKey(_))));
    }

    #[test]
    fn netaddr_parses_ip_port_pair() {
        let mut ctx = ConfigContext::new();
        ctx.set_str("cma", "10.0.0.1:1984");
        let addr = ctx.get_netaddr("cma").unwrap().unwrap();
        assert_eq!(addr, NetAddr::V4(Ipv4Addr::new(10, 0, 0, 1), 1984));
    }

    #[test]
    fn load_from_file_parses_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"nodename": "host1", "deadtime_us": 3000000}"#).unwrap();
        let ctx = ConfigContext::load(&path).unwrap();
        assert_eq!(ctx.get_str("nodename"), Some("host1"));
        assert_eq!(ctx.get_u64("deadtime_us"), Some(3_000_000));
    }
}
