//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the recording middleware via
//! the `State` extractor. The trace context is immutable after startup, so it
//! is shared behind an `Arc` without locking; every file operation runs on a
//! blocking thread.

use std::sync::Arc;

use tracestore::{ProcessUsage, TraceContext};

#[derive(Clone)]
pub struct AppState {
    pub trace: Arc<TraceContext>,
    /// Process-wide memory probe sampled when a request completes.
    pub usage: Arc<ProcessUsage>,
    /// Lowercased name of the trusted identity header.
    pub user_header: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(trace: TraceContext, user_header: &str) -> Self {
        Self {
            trace: Arc::new(trace),
            usage: Arc::new(ProcessUsage::new()),
            user_header: Arc::from(user_header),
        }
    }
}
