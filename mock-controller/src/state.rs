use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engine_worker::controller::{Claim, CreateRequest, StatusResponse};
use engine_worker::engine::game_state::{DEFAULT_RULESET, DEFAULT_SNAKE_TIMEOUT_MS};
use engine_worker::engine::{Game, GameFrame, GameStatus, StandardRuleset};
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_LEASE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("game {0} not found")]
    NotFound(String),
    #[error("{0}")]
    StaleClaim(String),
    #[error("{0}")]
    BadRequest(String),
}

/// One accepted frame and who sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub worker_id: String,
    pub turn: u32,
}

#[derive(Debug, Clone)]
struct Lease {
    token: String,
    worker_id: String,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

struct GameRecord {
    game: Game,
    frames: Vec<GameFrame>,
    lease: Option<Lease>,
    submissions: Vec<Submission>,
}

impl GameRecord {
    /// The lease behind `token`, if it is still the live one
    fn held_lease(&self, token: &str, now: Instant) -> Result<&Lease, StoreError> {
        match &self.lease {
            Some(lease) if lease.token == token && lease.is_live(now) => Ok(lease),
            Some(lease) if lease.token == token => Err(StoreError::StaleClaim(format!(
                "lease on {} expired",
                self.game.id
            ))),
            _ => Err(StoreError::StaleClaim(format!(
                "token does not hold {}",
                self.game.id
            ))),
        }
    }
}

#[derive(Default)]
struct Store {
    /// Game ids in creation order, so polling hands out the oldest first
    order: Vec<String>,
    games: HashMap<String, GameRecord>,
}

impl Store {
    fn record(&self, id: &str) -> Result<&GameRecord, StoreError> {
        self.games
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut GameRecord, StoreError> {
        self.games
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// Games, frames and leases held in memory
#[derive(Clone)]
pub struct ControllerState {
    store: Arc<Mutex<Store>>,
    lease: Duration,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self::with_lease(DEFAULT_LEASE)
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            lease,
        }
    }

    pub async fn create(&self, request: CreateRequest) -> Result<String, StoreError> {
        if request.width < 3 || request.height < 3 {
            return Err(StoreError::BadRequest(format!(
                "board {}x{} is too small",
                request.width, request.height
            )));
        }
        if request.snakes.is_empty() {
            return Err(StoreError::BadRequest("a game needs snakes".to_string()));
        }
        let cells = request.width as usize * request.height as usize;
        if request.snakes.len() > cells {
            return Err(StoreError::BadRequest(format!(
                "{} snakes do not fit on a {}x{} board",
                request.snakes.len(),
                request.width,
                request.height
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let game = Game {
            id: id.clone(),
            width: request.width,
            height: request.height,
            ruleset: request
                .ruleset
                .unwrap_or_else(|| DEFAULT_RULESET.to_string()),
            status: GameStatus::Unstarted,
            snakes: request.snakes,
            snake_timeout_ms: request
                .snake_timeout_ms
                .unwrap_or(DEFAULT_SNAKE_TIMEOUT_MS),
            max_turns: request.max_turns,
        };

        let mut store = self.store.lock().await;
        store.order.push(id.clone());
        store.games.insert(
            id.clone(),
            GameRecord {
                game,
                frames: Vec::new(),
                lease: None,
                submissions: Vec::new(),
            },
        );

        tracing::info!(game_id = %id, "Game created");
        Ok(id)
    }

    /// Build turn 0 and make the game claimable
    pub async fn start(&self, id: &str) -> Result<(), StoreError> {
        let mut store = self.store.lock().await;
        let record = store.record_mut(id)?;
        if record.game.status != GameStatus::Unstarted {
            return Err(StoreError::BadRequest(format!("game {id} already started")));
        }

        let frame = StandardRuleset::default()
            .initial_frame(&record.game)
            .map_err(|e| StoreError::BadRequest(e.to_string()))?;
        record.game.status = GameStatus::Running;
        record.frames.push(frame);

        tracing::info!(game_id = %id, "Game started");
        Ok(())
    }

    pub async fn status(&self, id: &str) -> Result<StatusResponse, StoreError> {
        let store = self.store.lock().await;
        let record = store.record(id)?;
        Ok(StatusResponse {
            game: record.game.clone(),
            last_frame: record.frames.last().cloned(),
        })
    }

    /// Lease the oldest running game nobody holds a live lease on
    pub async fn poll(&self, worker_id: &str) -> Option<Claim> {
        let now = Instant::now();
        let mut guard = self.store.lock().await;
        let store = &mut *guard;

        let id = store.order.iter().find_map(|id| {
            let record = store.games.get(id)?;
            let free = record.lease.as_ref().is_none_or(|lease| !lease.is_live(now));
            (record.game.status == GameStatus::Running && free).then_some(id.clone())
        })?;
        let record = store.games.get_mut(&id)?;

        if let Some(previous) = &record.lease {
            tracing::info!(
                game_id = %record.game.id,
                previous = %previous.worker_id,
                "Lease expired, handing game to another worker"
            );
        }

        let token = uuid::Uuid::new_v4().to_string();
        record.lease = Some(Lease {
            token: token.clone(),
            worker_id: worker_id.to_string(),
            expires_at: now + self.lease,
        });

        tracing::debug!(game_id = %record.game.id, worker_id, "Game claimed");
        Some(Claim {
            game: record.game.clone(),
            frame: record.frames.last()?.clone(),
            token,
            lease_ms: self.lease.as_millis() as u64,
        })
    }

    /// Accept the next frame from the lease holder and renew its lease.
    ///
    /// Resending the frame that was accepted last is acknowledged again
    /// without being stored twice, so a holder whose reply got lost can retry.
    pub async fn submit(
        &self,
        game_id: &str,
        token: &str,
        frame: GameFrame,
    ) -> Result<GameStatus, StoreError> {
        let now = Instant::now();
        let lease = self.lease;
        let mut store = self.store.lock().await;
        let record = store.record_mut(game_id)?;
        let worker_id = record.held_lease(token, now)?.worker_id.clone();

        if record.game.status == GameStatus::Stopped {
            return Ok(GameStatus::Stopped);
        }

        let renewed_at = now + lease;
        if record.frames.last() == Some(&frame) {
            tracing::debug!(game_id, turn = frame.turn, "Frame resent, acknowledging again");
            if let Some(held) = record.lease.as_mut() {
                held.expires_at = renewed_at;
            }
            return Ok(record.game.status);
        }

        let expected = record.frames.last().map_or(0, |last| last.turn + 1);
        if frame.turn != expected {
            return Err(StoreError::StaleClaim(format!(
                "expected turn {expected} for {game_id}, got {}",
                frame.turn
            )));
        }

        record.submissions.push(Submission {
            worker_id,
            turn: frame.turn,
        });
        record.frames.push(frame);
        if let Some(held) = record.lease.as_mut() {
            held.expires_at = renewed_at;
        }

        Ok(record.game.status)
    }

    /// Stop a game on behalf of its lease holder and release the lease
    pub async fn end(&self, game_id: &str, token: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut store = self.store.lock().await;
        let record = store.record_mut(game_id)?;
        record.held_lease(token, now)?;

        record.game.status = GameStatus::Stopped;
        record.lease = None;

        tracing::info!(game_id, turn = record.frames.last().map(|f| f.turn), "Game ended");
        Ok(())
    }

    /// Stop a game from outside; the holder learns about it on its next submit
    pub async fn stop(&self, id: &str) -> Result<(), StoreError> {
        let mut store = self.store.lock().await;
        store.record_mut(id)?.game.status = GameStatus::Stopped;
        tracing::info!(game_id = %id, "Game stopped");
        Ok(())
    }

    pub async fn frames(&self, id: &str) -> Result<Vec<GameFrame>, StoreError> {
        Ok(self.store.lock().await.record(id)?.frames.clone())
    }

    pub async fn submissions(&self, id: &str) -> Result<Vec<Submission>, StoreError> {
        Ok(self.store.lock().await.record(id)?.submissions.clone())
    }
}
