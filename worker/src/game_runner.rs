use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::controller::{Claim, Controller, ControllerError};
use crate::engine::{GameStatus, RulesetRegistry, get_winner, is_game_over};
use crate::retry::RetryPolicy;
use crate::snake_client::MoveProvider;

/// How a slot's hold on a game ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The game reached its end and was reported stopped
    Finished { turn: u32 },
    /// The controller stopped the game from outside
    Stopped { turn: u32 },
    /// The lease was lost or the controller stayed unreachable
    ClaimLost { turn: u32 },
    /// The game cannot be run by this worker
    Abandoned,
    /// Shutdown was requested mid-game; the lease is left to expire
    Cancelled,
}

/// Drives one claimed game until it ends or the claim is lost.
///
/// Injected into [`crate::worker::Worker`] so slots can be tested without
/// running real games.
#[async_trait]
pub trait GameRunner: Send + Sync {
    async fn run(&self, claim: Claim, cancel: &CancellationToken) -> RunOutcome;
}

/// Runs a game turn by turn: moves, tick, submit, repeat.
pub struct TickRunner {
    controller: Arc<dyn Controller>,
    registry: Arc<RulesetRegistry>,
    moves: Arc<dyn MoveProvider>,
    retry: RetryPolicy,
}

impl TickRunner {
    pub fn new(
        controller: Arc<dyn Controller>,
        registry: Arc<RulesetRegistry>,
        moves: Arc<dyn MoveProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            controller,
            registry,
            moves,
            retry,
        }
    }

    async fn end_game(&self, game_id: &str, token: &str) -> Result<(), ControllerError> {
        let controller = self.controller.as_ref();
        self.retry
            .run("end_game", || controller.end_game(game_id, token))
            .await
    }
}

#[async_trait]
impl GameRunner for TickRunner {
    async fn run(&self, claim: Claim, cancel: &CancellationToken) -> RunOutcome {
        let Claim {
            game, frame, token, ..
        } = claim;
        let game_id = game.id.as_str();

        let Some(ruleset) = self.registry.get(&game.ruleset) else {
            tracing::error!(
                game_id,
                ruleset = %game.ruleset,
                known = ?self.registry.names(),
                "Unknown ruleset, stopping game"
            );
            if let Err(e) = self.end_game(game_id, &token).await {
                tracing::warn!(game_id, error = %e, "Failed to stop game with unknown ruleset");
            }
            return RunOutcome::Abandoned;
        };

        tracing::info!(game_id, turn = frame.turn, ruleset = %game.ruleset, "Running game");

        let controller = self.controller.as_ref();
        let mut frame = frame;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(game_id, turn = frame.turn, "Shutdown requested, leaving game");
                return RunOutcome::Cancelled;
            }
            if is_game_over(&frame) {
                break;
            }
            if game.max_turns.is_some_and(|max| frame.turn >= max) {
                tracing::info!(game_id, turn = frame.turn, "Turn limit reached");
                break;
            }

            let moves = self.moves.request_moves(&game, &frame).await;
            let next = ruleset.tick(&game, &frame, &moves);

            for death in &next.deaths {
                tracing::debug!(
                    game_id,
                    turn = next.turn,
                    snake_id = %death.snake_id,
                    cause = ?death.cause,
                    "Snake died"
                );
            }

            let submitted = self
                .retry
                .run("submit_frame", || {
                    controller.submit_frame(game_id, &token, &next)
                })
                .await;

            match submitted {
                Ok(GameStatus::Stopped) => {
                    tracing::info!(game_id, turn = next.turn, "Game stopped by controller");
                    return RunOutcome::Stopped { turn: next.turn };
                }
                Ok(_) => frame = next,
                Err(e) => {
                    tracing::warn!(
                        game_id,
                        turn = next.turn,
                        error = %e,
                        "Lost claim on game, returning to polling"
                    );
                    return RunOutcome::ClaimLost { turn: frame.turn };
                }
            }
        }

        if let Err(e) = self.end_game(game_id, &token).await {
            tracing::warn!(game_id, turn = frame.turn, error = %e, "Failed to end game");
            return RunOutcome::ClaimLost { turn: frame.turn };
        }

        tracing::info!(
            game_id,
            turn = frame.turn,
            winner = get_winner(&frame).unwrap_or("none"),
            "Game finished"
        );
        RunOutcome::Finished { turn: frame.turn }
    }
}
