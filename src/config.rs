//! Host service configuration.
//!
//! Store settings come from [`StoreConfig::from_env`]; this module adds the
//! listener and scheduling knobs that only the server needs.

use std::time::Duration;

use tracestore::config::env_parse;
use tracestore::{ConfigError, StoreConfig};

const DEFAULT_PORT: u16 = 3000;
/// Once a day.
pub const DEFAULT_ROTATE_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_USER_HEADER: &str = "x-authenticated-user";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub rotate_interval: Duration,
    /// Header a fronting proxy uses to pass the signed-in user as `id:login`.
    pub user_header: String,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `LOADGRAPH_ROTATE_INTERVAL_SECS`: default 86400
    /// - `LOADGRAPH_USER_HEADER`: default `x-authenticated-user`
    /// - everything read by [`StoreConfig::from_env`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store config is invalid or the rotation
    /// interval is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rotate_interval_secs = env_parse("LOADGRAPH_ROTATE_INTERVAL_SECS", DEFAULT_ROTATE_INTERVAL_SECS);
        if rotate_interval_secs == 0 {
            return Err(ConfigError::ZeroValue { var: "LOADGRAPH_ROTATE_INTERVAL_SECS" });
        }
        let user_header = std::env::var("LOADGRAPH_USER_HEADER")
            .ok()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_HEADER.to_owned());

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            rotate_interval: Duration::from_secs(rotate_interval_secs),
            user_header,
            store: StoreConfig::from_env()?,
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
