use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use engine_worker::controller::{
    CreateRequest, CreateResponse, Empty, EndGameRequest, GameRequest, PingResponse, PollRequest,
    PollResponse, StatusResponse, SubmitFrameRequest, SubmitFrameResponse,
};

use crate::state::{ControllerState, StoreError};

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::StaleClaim(_) => StatusCode::CONFLICT,
            StoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// POST /rpc/ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /rpc/poll
///
/// Hands out at most one claim per call. An empty claim means there is
/// nothing to run right now.
pub async fn poll(
    State(state): State<ControllerState>,
    Json(request): Json<PollRequest>,
) -> Json<PollResponse> {
    let claim = state.poll(&request.worker_id).await;
    Json(PollResponse { claim })
}

/// POST /rpc/submit_frame
///
/// Answers 409 when the token no longer holds the game or the turn is not
/// the next one.
pub async fn submit_frame(
    State(state): State<ControllerState>,
    Json(request): Json<SubmitFrameRequest>,
) -> Result<Json<SubmitFrameResponse>, StoreError> {
    let turn = request.frame.turn;
    let status = state
        .submit(&request.game_id, &request.token, request.frame)
        .await
        .inspect_err(|e| {
            tracing::info!(game_id = %request.game_id, turn, error = %e, "Rejected frame");
        })?;
    Ok(Json(SubmitFrameResponse { status }))
}

/// POST /rpc/end_game
pub async fn end_game(
    State(state): State<ControllerState>,
    Json(request): Json<EndGameRequest>,
) -> Result<Json<Empty>, StoreError> {
    state.end(&request.game_id, &request.token).await?;
    Ok(Json(Empty::default()))
}

/// POST /rpc/create
pub async fn create(
    State(state): State<ControllerState>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, StoreError> {
    let id = state.create(request).await?;
    Ok(Json(CreateResponse { id }))
}

/// POST /rpc/start
pub async fn start(
    State(state): State<ControllerState>,
    Json(request): Json<GameRequest>,
) -> Result<Json<Empty>, StoreError> {
    state.start(&request.id).await?;
    Ok(Json(Empty::default()))
}

/// POST /rpc/status
pub async fn status(
    State(state): State<ControllerState>,
    Json(request): Json<GameRequest>,
) -> Result<Json<StatusResponse>, StoreError> {
    Ok(Json(state.status(&request.id).await?))
}

/// POST /_admin/stop
///
/// Stop a game as an operator would. The worker driving it finds out on its
/// next submit.
pub async fn admin_stop(
    State(state): State<ControllerState>,
    Json(request): Json<GameRequest>,
) -> Result<StatusCode, StoreError> {
    state.stop(&request.id).await?;
    Ok(StatusCode::OK)
}
