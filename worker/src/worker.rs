use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use crate::controller::Controller;
use crate::game_runner::{GameRunner, RunOutcome};

/// A pool of slots, each claiming and running one game at a time
#[derive(Clone)]
pub struct Worker {
    controller: Arc<dyn Controller>,
    runner: Arc<dyn GameRunner>,
    worker_id: String,
    poll_interval: Duration,
    ping_retry_delay: Duration,
}

impl Worker {
    pub fn new(
        controller: Arc<dyn Controller>,
        runner: Arc<dyn GameRunner>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            runner,
            worker_id: worker_id.into(),
            poll_interval: Duration::from_secs(1),
            ping_retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_ping_retry_delay(mut self, delay: Duration) -> Self {
        self.ping_retry_delay = delay;
        self
    }

    /// Run `slots` slots until `cancel` fires.
    ///
    /// No slot starts before the controller has answered a ping. Returns once
    /// every slot has finished its current game or poll.
    pub async fn run(&self, cancel: CancellationToken, slots: usize) {
        if !self.wait_for_controller(&cancel).await {
            return;
        }

        tracing::info!(slots, worker_id = %self.worker_id, "Starting worker slots");

        let mut tasks = JoinSet::new();
        for slot in 0..slots {
            let worker = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(
                async move { worker.run_slot(slot, cancel).await }
                    .instrument(tracing::info_span!("slot", worker = slot)),
            );
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker slot panicked");
            }
        }

        tracing::info!("All worker slots stopped");
    }

    /// Ping until the controller answers. Returns false if cancelled first.
    async fn wait_for_controller(&self, cancel: &CancellationToken) -> bool {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.controller.ping().await {
                Ok(version) => {
                    tracing::info!(version = %version, attempt, "Controller is up");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        error = %e,
                        retry_in_ms = self.ping_retry_delay.as_millis() as u64,
                        "Controller unreachable, waiting"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.ping_retry_delay) => {}
            }
        }
    }

    async fn run_slot(&self, slot: usize, cancel: CancellationToken) {
        let poller_id = format!("{}-{}", self.worker_id, slot);
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let claim = match self.controller.poll(&poller_id).await {
                Ok(Some(claim)) => claim,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Poll failed");
                    continue;
                }
            };

            let game_id = claim.game.id.clone();
            tracing::info!(game_id = %game_id, turn = claim.frame.turn, "Claimed game");

            let outcome = self.runner.run(claim, &cancel).await;
            match outcome {
                RunOutcome::ClaimLost { turn } => {
                    tracing::warn!(game_id = %game_id, turn, "Claim lost");
                }
                outcome => {
                    tracing::info!(game_id = %game_id, outcome = ?outcome, "Released game");
                }
            }
        }

        tracing::debug!("Slot stopped");
    }
}
