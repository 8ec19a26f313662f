//! HTTP client for asking snake servers for their moves
//!
//! Every live snake gets one bounded `/move` request per turn. A snake that
//! times out, errors or answers with something that is not a direction gets
//! an update without a direction, and the ruleset decides what that means.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::engine::{Direction, Game, GameFrame, Snake, SnakeUpdate};

/// Where moves come from. Swappable so runners can be tested without
/// snake servers.
#[async_trait]
pub trait MoveProvider: Send + Sync {
    async fn request_moves(&self, game: &Game, frame: &GameFrame) -> Vec<SnakeUpdate>;
}

/// Response from a snake's /move endpoint
#[derive(Debug, Deserialize)]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub direction: String,
    pub shout: Option<String>,
}

/// Body sent to a snake's /move endpoint
#[derive(Debug, Serialize)]
pub struct MoveRequest<'a> {
    pub game: &'a Game,
    pub turn: u32,
    pub you: &'a Snake,
    pub board: &'a GameFrame,
}

#[derive(Debug, Clone)]
pub struct HttpMoveProvider {
    client: Client,
}

impl HttpMoveProvider {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().pool_max_idle_per_host(16).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MoveProvider for HttpMoveProvider {
    async fn request_moves(&self, game: &Game, frame: &GameFrame) -> Vec<SnakeUpdate> {
        let timeout = Duration::from_millis(game.snake_timeout_ms);

        let futures: Vec<_> = frame
            .alive_snakes()
            .filter_map(|snake| {
                game.snakes
                    .iter()
                    .find(|s| s.id == snake.id)
                    .map(|registered| {
                        let body = MoveRequest {
                            game,
                            turn: frame.turn,
                            you: snake,
                            board: frame,
                        };
                        request_move(&self.client, &registered.url, body, timeout)
                    })
            })
            .collect();

        futures::future::join_all(futures).await
    }
}

/// Call a snake's /move endpoint
pub async fn request_move(
    client: &Client,
    url: &str,
    body: MoveRequest<'_>,
    timeout: Duration,
) -> SnakeUpdate {
    let snake_id = body.you.id.clone();
    let move_url = format!("{}/move", url.trim_end_matches('/'));

    let start = Instant::now();
    let result = tokio::time::timeout(timeout, async {
        client
            .post(&move_url)
            .json(&body)
            .send()
            .await?
            .json::<MoveResponse>()
            .await
    })
    .await;
    let elapsed = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(response)) => {
            let direction = Direction::from_str(&response.direction);
            if direction.is_none() {
                tracing::warn!(
                    snake_id = %snake_id,
                    answer = %response.direction,
                    "Snake answered with an unknown move"
                );
            }
            SnakeUpdate {
                snake_id,
                direction,
                latency_ms: Some(elapsed),
                timed_out: false,
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(snake_id = %snake_id, error = %e, "Error calling snake");
            SnakeUpdate {
                snake_id,
                direction: None,
                latency_ms: Some(elapsed),
                timed_out: false,
            }
        }
        Err(_) => {
            tracing::warn!(
                snake_id = %snake_id,
                timeout_ms = timeout.as_millis() as u64,
                "Snake timed out"
            );
            SnakeUpdate {
                snake_id,
                direction: None,
                latency_ms: None,
                timed_out: true,
            }
        }
    }
}
