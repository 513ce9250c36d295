//! Configuration handling for the application.
//!
//! All runtime knobs come from the environment. `Config::from_env` performs
//! the loading with sensible development defaults; only the channel name is
//! mandatory, since there is no meaningful default for it.

use std::env;

use thiserror::Error;

/// Environment variable names. Keeping them public lets tests and the
/// binaries refer to them without duplicating string literals.
pub const ENV_CHANNEL: &str = "CHANNEL";
pub const ENV_TELEGRAM_HOST: &str = "TELEGRAM_HOST";
pub const ENV_STATIC_PROXY: &str = "STATIC_PROXY";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";

/// Default values used when environment variables are absent.
/// `t.me` can also be `telegram.me` or `telegram.dog`.
const DEFAULT_TELEGRAM_HOST: &str = "t.me";
const DEFAULT_STATIC_PROXY: &str = "/static/";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Application runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    channel: String,
    telegram_host: String,
    static_proxy: String,
    bind_addr: String,
}

impl Config {
    /// Create a new config explicitly.
    pub fn new(
        channel: impl Into<String>,
        telegram_host: impl Into<String>,
        static_proxy: impl Into<String>,
        bind_addr: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            telegram_host: telegram_host.into(),
            static_proxy: static_proxy.into(),
            bind_addr: bind_addr.into(),
        }
    }

    /// Load from environment variables, falling back to development defaults
    /// for everything except the channel name.
    pub fn from_env() -> Result<Self, ConfigError> {
        let channel = env::var(ENV_CHANNEL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingChannel)?;
        let telegram_host =
            env::var(ENV_TELEGRAM_HOST).unwrap_or_else(|_| DEFAULT_TELEGRAM_HOST.to_string());
        let static_proxy =
            env::var(ENV_STATIC_PROXY).unwrap_or_else(|_| DEFAULT_STATIC_PROXY.to_string());
        let bind_addr = env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        Ok(Self {
            channel,
            telegram_host,
            static_proxy,
            bind_addr,
        })
    }

    /// The public channel whose preview page is being normalized.
    pub fn channel(&self) -> &str {
        &self.channel
    }
    /// Hostname of the preview mirror (`t.me` unless overridden).
    pub fn telegram_host(&self) -> &str {
        &self.telegram_host
    }
    /// Prefix prepended to every rewritten asset URL.
    pub fn static_proxy(&self) -> &str {
        &self.static_proxy
    }
    /// TCP bind address (host:port) for the HTTP server.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the CHANNEL environment variable must be set to a channel name")]
    MissingChannel,
}
