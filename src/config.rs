//! Runtime configuration
//!
//! Read from environment variables with compiled defaults, matching the
//! deployment convention of the rest of the chat stack.

use std::env;

/// Default WebSocket listen address
const DEFAULT_SOCKET_ADDR: &str = "127.0.0.1:3002";

/// Default operational HTTP listen address
const DEFAULT_OPS_ADDR: &str = "127.0.0.1:3003";

/// Default message-persistence backend base URL
const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket listen address (`SOCKET_ADDR`)
    pub socket_addr: String,
    /// Operational HTTP listen address (`OPS_ADDR`)
    pub ops_addr: String,
    /// Persistence backend base URL (`BACKEND_URL`)
    pub backend_url: String,
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Self {
        Self {
            socket_addr: env::var("SOCKET_ADDR")
                .unwrap_or_else(|_| DEFAULT_SOCKET_ADDR.to_string()),
            ops_addr: env::var("OPS_ADDR").unwrap_or_else(|_| DEFAULT_OPS_ADDR.to_string()),
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_env_unset() {
        env::remove_var("SOCKET_ADDR");
        env::remove_var("OPS_ADDR");
        env::remove_var("BACKEND_URL");

        let config = Config::from_env();
        assert_eq!(config.socket_addr, DEFAULT_SOCKET_ADDR);
        assert_eq!(config.ops_addr, DEFAULT_OPS_ADDR);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
    }
}
