//! Server execution logic.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::geo::CountryResolver;

use super::{
    handler::{get_connections, get_stats, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Run the matchmaking and signaling relay server.
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8080)
/// * `geo` - Geography lookup collaborator, `None` to disable resolution
pub async fn run_server(
    host: String,
    port: u16,
    geo: Option<Arc<dyn CountryResolver>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new(geo));

    let app = Router::new()
        // WebSocket endpoint
        .route("/ws", get(websocket_handler))
        // HTTP observability endpoints
        .route("/api/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .route("/api/connections", get(get_connections))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Bind the server to the host and port
    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(
        "Matchmaking signaling server listening on {}",
        listener.local_addr()?
    );
    tracing::info!("Connect to: ws://{}/ws", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    // Peer addresses are needed for the geography lookup
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
