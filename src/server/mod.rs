//! HTTP/WebSocket service.

mod actions;
mod execute;
mod router;
mod state;
mod ws;

pub use execute::canonicalize_action;
pub use router::build_router;
pub use state::AppState;

use tracing::info;

use crate::config::AppConfig;

/// Run the host until the process is stopped.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    crate::metrics::register_metrics();
    let addr = config.bind_addr()?;
    let state = AppState::new(config);
    let registry = std::sync::Arc::clone(&state.registry);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gaia host listening");
    let result = axum::serve(listener, router).await;
    registry.close_all().await;
    Ok(result?)
}
