// In-memory controller for unit tests

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Claim, Controller, ControllerError};
use crate::engine::{GameFrame, GameStatus};

#[derive(Default)]
pub(crate) struct FakeState {
    /// Pings that fail before the controller "comes up"
    pub ping_failures: u32,
    pub pings: u32,
    pub claims: VecDeque<Claim>,
    pub polls: Vec<String>,
    /// Replies for upcoming submits; `Ok(Running)` once empty
    pub submit_replies: VecDeque<Result<GameStatus, ControllerError>>,
    pub submit_attempts: u32,
    pub accepted: Vec<(String, u32)>,
    pub ended: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeController {
    state: Mutex<FakeState>,
}

impl FakeController {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Controller for FakeController {
    async fn ping(&self) -> Result<String, ControllerError> {
        let mut state = self.state();
        state.pings += 1;
        if state.pings <= state.ping_failures {
            return Err(ControllerError::Transport("connection refused".to_string()));
        }
        Ok("test".to_string())
    }

    async fn poll(&self, worker_id: &str) -> Result<Option<Claim>, ControllerError> {
        let mut state = self.state();
        state.polls.push(worker_id.to_string());
        Ok(state.claims.pop_front())
    }

    async fn submit_frame(
        &self,
        game_id: &str,
        _token: &str,
        frame: &GameFrame,
    ) -> Result<GameStatus, ControllerError> {
        let mut state = self.state();
        state.submit_attempts += 1;
        let reply = state
            .submit_replies
            .pop_front()
            .unwrap_or(Ok(GameStatus::Running));
        if reply.is_ok() {
            state.accepted.push((game_id.to_string(), frame.turn));
        }
        reply
    }

    async fn end_game(&self, game_id: &str, _token: &str) -> Result<(), ControllerError> {
        self.state().ended.push(game_id.to_string());
        Ok(())
    }
}
