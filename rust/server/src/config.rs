use std::net::SocketAddr;

use anyhow::Context;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BROADCAST_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Snapshots buffered per room for slow WebSocket subscribers.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            broadcast_capacity: lookup("JARLTAFL_BROADCAST_CAPACITY")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.broadcast_capacity),
        }
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let env = HashMap::from([
            ("HOST", "127.0.0.1".to_string()),
            ("PORT", "not-a-port".to_string()),
            ("JARLTAFL_BROADCAST_CAPACITY", "64".to_string()),
        ]);
        let cfg = ServerConfig::from_lookup(|k| env.get(k).cloned());
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.broadcast_capacity, 64);
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn zero_capacity_falls_back() {
        let cfg = ServerConfig::from_lookup(|k| {
            (k == "JARLTAFL_BROADCAST_CAPACITY").then(|| "0".to_string())
        });
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn bad_host_is_an_error() {
        let cfg = ServerConfig {
            host: "not a host".into(),
            ..ServerConfig::default()
        };
        assert!(cfg.addr().is_err());
    }
}
