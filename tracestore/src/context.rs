//! Explicitly constructed trace context.
//!
//! Bundles the resolved configuration and the store so the host, the rotation
//! job and the CLI share one object instead of process-wide singletons.

use records::Keystream;

use crate::config::{ConfigError, StoreConfig};
use crate::secret;
use crate::store::{QueryResult, RotateOutcome, StoreError, TraceStore};

#[derive(Debug, Clone)]
pub struct TraceContext {
    config: StoreConfig,
    store: TraceStore,
}

impl TraceContext {
    /// Resolve the secret, derive the keystream and build the store.
    ///
    /// Does not touch the data directory; call [`TraceStore::initialize`]
    /// during installation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid limits or an unusable secret.
    pub fn open(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let secret = secret::resolve(&config.secret)?;
        let store = TraceStore::new(config.data_dir.clone(), Keystream::derive(&secret));
        Ok(Self { config, store })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    /// Query a window capped at the configured fetch limit.
    ///
    /// # Errors
    ///
    /// Propagates [`TraceStore::query`] failures.
    pub fn query_window(&self, from: f64, to: f64) -> Result<QueryResult, StoreError> {
        self.store.query(from, to, self.config.fetch_limit)
    }

    /// Scheduled rotation entry point, using the configured maximum size.
    ///
    /// # Errors
    ///
    /// Propagates [`TraceStore::rotate`] failures.
    pub fn rotate_if_needed(&self) -> Result<RotateOutcome, StoreError> {
        self.store.rotate(self.config.max_trace_bytes)
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
