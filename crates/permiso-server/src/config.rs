// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server-specific configuration on top of the core engine config.

use std::net::SocketAddr;

use permiso_core::config::ConfigError;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    pub http_addr: SocketAddr,
    /// Telegram bot token for outbound notifications; absent disables delivery
    pub bot_token: Option<String>,
}

impl ServerConfig {
    /// Load server configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `PERMISO_HTTP_PORT`: HTTP API port (default: 8080)
    /// - `PERMISO_BOT_TOKEN`: Telegram bot token (default: unset, delivery disabled)
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_port: u16 = std::env::var("PERMISO_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("PERMISO_HTTP_PORT", "must be a valid port number")
            })?;

        let bot_token = std::env::var("PERMISO_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            bot_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe {
            env::remove_var("PERMISO_HTTP_PORT");
            env::remove_var("PERMISO_BOT_TOKEN");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.http_addr.port(), 8080);
        assert!(config.bot_token.is_none());
    }

    #[test]
    fn test_custom_port_and_token() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe {
            env::set_var("PERMISO_HTTP_PORT", "9090");
            env::set_var("PERMISO_BOT_TOKEN", "123:abc");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.http_addr.port(), 9090);
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));

        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe {
            env::remove_var("PERMISO_HTTP_PORT");
            env::remove_var("PERMISO_BOT_TOKEN");
        }
    }

    #[test]
    fn test_invalid_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe { env::set_var("PERMISO_HTTP_PORT", "not_a_port") };

        let result = ServerConfig::from_env();
        assert!(result.is_err());

        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe { env::remove_var("PERMISO_HTTP_PORT") };
    }
}
