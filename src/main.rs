mod config;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;

use tracestore::{ConfigError, StoreError, TraceContext};
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("server i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env()?;
    let trace = TraceContext::open(config.store.clone())?;
    trace.store().initialize()?;
    info!(
        path = %trace.store().path().display(),
        max_bytes = config.store.max_trace_bytes,
        fetch_limit = config.store.fetch_limit,
        "trace store ready"
    );

    let state = state::AppState::new(trace, &config.user_header);

    // Spawn background rotation task.
    let _rotation = services::rotation::spawn_rotation_task(state.clone(), config.rotate_interval);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    info!(port = config.port, "loadgraph listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
