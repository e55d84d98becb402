//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The dashboard endpoints and the health probe share one Axum router. The
//! recording middleware wraps everything, the fallback included, so the
//! service traces its own traffic like any host would.

pub mod trace;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router};
use axum::middleware;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracestore::StoreStatus;
use tracing::error;

use crate::services::recorder;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/trace", get(trace::timeline))
        .route("/api/trace/raw", get(trace::raw))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), recorder::record_request))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness plus the trace log's path and size.
async fn healthz(State(state): State<AppState>) -> Result<Json<StoreStatus>, StatusCode> {
    let trace = Arc::clone(&state.trace);
    let status = tokio::task::spawn_blocking(move || trace.store().status())
        .await
        .map_err(|e| {
            error!(error = %e, "status task aborted");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!(error = %e, "trace store status failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok(Json(status))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
