pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::{Router, routing::post};

pub use state::{ControllerState, StoreError, Submission};

/// Create the mock controller router
pub fn create_router(state: ControllerState) -> Router {
    Router::new()
        // Worker protocol
        .route("/rpc/ping", post(routes::ping))
        .route("/rpc/poll", post(routes::poll))
        .route("/rpc/submit_frame", post(routes::submit_frame))
        .route("/rpc/end_game", post(routes::end_game))
        // Game lifecycle
        .route("/rpc/create", post(routes::create))
        .route("/rpc/start", post(routes::start))
        .route("/rpc/status", post(routes::status))
        // Admin endpoint for test control
        .route("/_admin/stop", post(routes::admin_stop))
        .with_state(state)
}

/// Run the mock controller on the specified port
pub async fn run_server(port: u16, state: ControllerState) -> color_eyre::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Mock controller running on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Serve on an ephemeral local port in the background, for tests
pub async fn spawn(state: ControllerState) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Mock controller stopped");
        }
    });

    Ok(addr)
}
