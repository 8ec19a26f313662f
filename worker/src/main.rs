use std::sync::Arc;

use clap::Parser as _;
use color_eyre::eyre::Context as _;
use tokio_util::sync::CancellationToken;
use tracing::info;

use engine_worker::controller::{ChaosInterceptor, ControllerClient, MetricsInterceptor};
use engine_worker::engine::RulesetRegistry;
use engine_worker::snake_client::HttpMoveProvider;
use engine_worker::{TickRunner, Worker, WorkerConfig, telemetry};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config = WorkerConfig::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { run_application(config).await })
}

async fn run_application(config: WorkerConfig) -> color_eyre::Result<()> {
    telemetry::setup_tracing()?;

    config.validate().wrap_err("Invalid configuration")?;
    let controller_url = config.controller_url()?;
    let worker_id = config.worker_id();

    let mut client = ControllerClient::http(controller_url.clone(), config.call_timeout)
        .wrap_err("Failed to build controller client")?
        .with_interceptor(Arc::new(MetricsInterceptor::default()));
    if config.chaos {
        tracing::warn!("Chaos mode enabled, controller calls will be randomly delayed");
        client = client.with_interceptor(Arc::new(ChaosInterceptor::new()));
    }
    let controller = Arc::new(client);

    let registry = Arc::new(RulesetRegistry::load(config.rulesets_dir().as_deref()));
    info!(rulesets = ?registry.names(), "Rulesets loaded");

    let moves = Arc::new(HttpMoveProvider::new().wrap_err("Failed to build snake client")?);
    let runner = Arc::new(TickRunner::new(
        controller.clone(),
        registry,
        moves,
        config.retry_policy(),
    ));

    let worker = Worker::new(controller, runner, worker_id.clone())
        .with_poll_interval(config.poll_interval);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Unable to listen for shutdown signal");
                return;
            }
            info!("Shutdown requested, draining slots");
            cancel.cancel();
        }
    });

    info!(
        controller = %controller_url,
        worker_id = %worker_id,
        threads = config.threads,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting engine worker"
    );
    worker.run(cancel, config.threads).await;

    info!("Engine worker stopped");
    Ok(())
}
