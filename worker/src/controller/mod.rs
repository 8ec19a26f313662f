//! The controller as seen from a worker.
//!
//! The controller owns games, frames and leases. A worker only ever asks it
//! for work, reports frames for the games it holds a lease on, and tells it
//! when a game is over. Transport is JSON over HTTP, one `POST /rpc/{method}`
//! per operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::{Game, GameFrame, GameSnake, GameStatus};

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod interceptors;

pub use client::{ControllerClient, HttpTransport, Transport};
pub use interceptors::{Call, ChaosInterceptor, Interceptor, MetricsInterceptor, Next};

pub mod methods {
    pub const PING: &str = "ping";
    pub const POLL: &str = "poll";
    pub const SUBMIT_FRAME: &str = "submit_frame";
    pub const END_GAME: &str = "end_game";
    pub const CREATE: &str = "create";
    pub const START: &str = "start";
    pub const STATUS: &str = "status";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("controller unreachable: {0}")]
    Transport(String),
    #[error("call to {method} timed out")]
    Timeout { method: String },
    #[error("claim is no longer held: {0}")]
    StaleClaim(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("controller rejected call with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unable to decode controller message: {0}")]
    Decode(String),
}

impl ControllerError {
    /// Whether trying the same call again could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::StaleClaim(_) | Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}

/// An exclusive, time-bounded right to drive one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub game: Game,
    /// Latest frame the controller has for the game
    pub frame: GameFrame,
    pub token: String,
    pub lease_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollRequest {
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    pub claim: Option<Claim>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitFrameRequest {
    pub game_id: String,
    pub token: String,
    pub frame: GameFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitFrameResponse {
    pub status: GameStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndGameRequest {
    pub game_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub ruleset: Option<String>,
    pub snakes: Vec<GameSnake>,
    #[serde(default)]
    pub snake_timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_turns: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub game: Game,
    pub last_frame: Option<GameFrame>,
}

/// Operations a worker needs from the controller.
///
/// Implementations are shared by every worker slot and must tolerate
/// concurrent calls.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Liveness check, returns the controller version
    async fn ping(&self) -> Result<String, ControllerError>;

    /// Try to claim one runnable game
    async fn poll(&self, worker_id: &str) -> Result<Option<Claim>, ControllerError>;

    /// Publish the next frame of a claimed game. Renews the lease and returns
    /// the game's status as the controller sees it.
    async fn submit_frame(
        &self,
        game_id: &str,
        token: &str,
        frame: &GameFrame,
    ) -> Result<GameStatus, ControllerError>;

    /// Mark a claimed game stopped and release the lease
    async fn end_game(&self, game_id: &str, token: &str) -> Result<(), ControllerError>;
}
