//! Store configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./loadgraph-data";
pub const DEFAULT_SECRET_FILE: &str = "./loadgraph.secret";
/// 200 MiB.
pub const DEFAULT_MAX_TRACE_BYTES: u64 = 200 * 1024 * 1024;
pub const DEFAULT_FETCH_LIMIT: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be greater than zero")]
    ZeroValue { var: &'static str },
    #[error("installation secret is empty")]
    EmptySecret,
    #[error("secret file {}: {source}", .path.display())]
    SecretIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the installation secret comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Secret given directly (e.g. `LOADGRAPH_SECRET`).
    Inline(String),
    /// Secret stored in a file, generated on first use.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the log file and its marker files.
    pub data_dir: PathBuf,
    pub secret: SecretSource,
    /// File size at which rotation trims the log.
    pub max_trace_bytes: u64,
    /// Maximum records returned by one query.
    pub fetch_limit: usize,
}

impl StoreConfig {
    /// Config with default limits for the given directory and secret.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, secret: SecretSource) -> Self {
        Self {
            data_dir: data_dir.into(),
            secret,
            max_trace_bytes: DEFAULT_MAX_TRACE_BYTES,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    /// Build typed store config from environment variables.
    ///
    /// Optional:
    /// - `LOADGRAPH_DATA_DIR`: default `./loadgraph-data`
    /// - `LOADGRAPH_SECRET`: installation secret; wins over the file
    /// - `LOADGRAPH_SECRET_FILE`: default `./loadgraph.secret`
    /// - `LOADGRAPH_MAX_TRACE_BYTES`: default 200 MiB
    /// - `LOADGRAPH_FETCH_LIMIT`: default 5000
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroValue`] when a limit is set to zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("LOADGRAPH_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_owned());
        let secret = match std::env::var("LOADGRAPH_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => SecretSource::Inline(secret),
            _ => SecretSource::File(
                std::env::var("LOADGRAPH_SECRET_FILE")
                    .unwrap_or_else(|_| DEFAULT_SECRET_FILE.to_owned())
                    .into(),
            ),
        };

        let config = Self {
            data_dir: data_dir.into(),
            secret,
            max_trace_bytes: env_parse("LOADGRAPH_MAX_TRACE_BYTES", DEFAULT_MAX_TRACE_BYTES),
            fetch_limit: env_parse("LOADGRAPH_FETCH_LIMIT", DEFAULT_FETCH_LIMIT),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make the store unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroValue`] for a zero size or fetch limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trace_bytes == 0 {
            return Err(ConfigError::ZeroValue { var: "LOADGRAPH_MAX_TRACE_BYTES" });
        }
        if self.fetch_limit == 0 {
            return Err(ConfigError::ZeroValue { var: "LOADGRAPH_FETCH_LIMIT" });
        }
        Ok(())
    }
}

pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
