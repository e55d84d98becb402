//! Dashboard endpoints over the trace log.
//!
//! `GET /api/trace` returns the packed timeline the chart renders;
//! `GET /api/trace/raw` returns the decoded records as stored. Both take an
//! optional `from`/`to` window in Unix seconds and default to the last day.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use timeline::{TimelinePayload, build_timeline};
use tracestore::QueryResult;
use tracing::error;

use crate::services::recorder::unix_now;
use crate::state::AppState;

/// One day.
pub const DEFAULT_WINDOW_SECS: f64 = 86_400.0;

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub from: Option<f64>,
    pub to: Option<f64>,
}

/// Resolve the requested window against `now`.
///
/// # Errors
///
/// Returns `400 Bad Request` for non-finite bounds or `from > to`.
pub fn resolve_window(params: &WindowParams, now: f64) -> Result<(f64, f64), StatusCode> {
    let to = params.to.unwrap_or(now);
    let from = params.from.unwrap_or(to - DEFAULT_WINDOW_SECS);
    if !from.is_finite() || !to.is_finite() || from > to {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok((from, to))
}

/// `GET /api/trace`: packed timeline for the window.
///
/// # Errors
///
/// Returns `400` for a bad window and `500` when the log cannot be read.
pub async fn timeline(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<TimelinePayload>, StatusCode> {
    let (from, to) = resolve_window(&params, unix_now())?;
    let result = query(&state, from, to).await?;
    Ok(Json(build_timeline(&result.records, to, result.truncated)))
}

/// `GET /api/trace/raw`: decoded records for the window.
///
/// # Errors
///
/// Returns `400` for a bad window and `500` when the log cannot be read.
pub async fn raw(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<QueryResult>, StatusCode> {
    let (from, to) = resolve_window(&params, unix_now())?;
    query(&state, from, to).await.map(Json)
}

async fn query(state: &AppState, from: f64, to: f64) -> Result<QueryResult, StatusCode> {
    let trace = Arc::clone(&state.trace);
    tokio::task::spawn_blocking(move || trace.query_window(from, to))
        .await
        .map_err(|e| {
            error!(error = %e, "trace query task aborted");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!(error = %e, from, to, "trace query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
#[path = "trace_test.rs"]
mod tests;
