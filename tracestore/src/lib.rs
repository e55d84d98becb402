//! Append-only trace log for per-request timing events.
//!
//! ARCHITECTURE
//! ============
//! Each served request appends one obfuscated line to a flat file. The
//! dashboard reads a time window back with [`TraceStore::query`], and a daily
//! job keeps the file bounded with [`TraceStore::rotate`]. [`TraceContext`]
//! bundles configuration, the derived keystream and the store so callers pass
//! one explicit object around instead of reaching for globals.
//!
//! CONCURRENCY
//! ===========
//! Writers only append, one whole line per `write`, and rely on the OS append
//! mode to interleave lines rather than bytes. Readers tolerate a torn
//! trailing line by skipping it. Rotation assumes it is the only rotation in
//! flight; a line appended during its copy phase may be lost.

pub mod config;
mod context;
mod probe;
pub mod secret;
mod store;

pub use config::{ConfigError, SecretSource, StoreConfig};
pub use context::TraceContext;
pub use probe::{FixedUsage, ProcessUsage, RequestSample, UsageProbe};
pub use store::{QueryResult, RotateOutcome, StoreError, StoreStatus, TraceStore};
