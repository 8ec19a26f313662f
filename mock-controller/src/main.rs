use std::time::Duration;

use color_eyre::eyre::Context;
use mock_controller::ControllerState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_controller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get port from env or default to 3004, where workers look by default
    let port: u16 = std::env::var("MOCK_CONTROLLER_PORT")
        .unwrap_or_else(|_| "3004".to_string())
        .parse()
        .wrap_err("Invalid MOCK_CONTROLLER_PORT")?;

    let lease_secs: u64 = std::env::var("MOCK_CONTROLLER_LEASE_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .wrap_err("Invalid MOCK_CONTROLLER_LEASE_SECS")?;

    tracing::info!(port, lease_secs, "Starting mock controller");

    let state = ControllerState::with_lease(Duration::from_secs(lease_secs));
    mock_controller::run_server(port, state).await
}
