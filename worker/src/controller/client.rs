use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

use super::interceptors::{Call, Interceptor, Next};
use super::{
    Claim, Controller, ControllerError, CreateRequest, CreateResponse, Empty, EndGameRequest,
    GameRequest, PingResponse, PollRequest, PollResponse, StatusResponse, SubmitFrameRequest,
    SubmitFrameResponse, methods,
};
use crate::engine::{GameFrame, GameStatus};

/// Moves an already intercepted call to the controller and back
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, call: Call) -> Result<Value, ControllerError>;
}

/// Typed controller operations over an interceptor chain and a transport.
///
/// Every call gets its own deadline of `call_timeout`. Cloning is cheap and
/// clones share the transport and interceptors.
#[derive(Clone)]
pub struct ControllerClient {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    call_timeout: Duration,
}

impl ControllerClient {
    pub fn new(transport: Arc<dyn Transport>, call_timeout: Duration) -> Self {
        Self {
            transport,
            interceptors: Vec::new(),
            call_timeout,
        }
    }

    pub fn http(addr: Url, call_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpTransport::new(addr)?), call_timeout))
    }

    /// Append an interceptor. The first one added sees each call first.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    async fn call<Req, Resp>(&self, method: &'static str, request: &Req) -> Result<Resp, ControllerError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_value(request)
            .map_err(|e| ControllerError::Decode(format!("{method} request: {e}")))?;
        let deadline = Instant::now() + self.call_timeout;
        let call = Call {
            method,
            body,
            deadline,
        };

        let next = Next::new(&self.interceptors, self.transport.as_ref());
        let value = match tokio::time::timeout_at(deadline, next.run(call)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ControllerError::Timeout {
                    method: method.to_string(),
                });
            }
        };

        serde_json::from_value(value)
            .map_err(|e| ControllerError::Decode(format!("{method} response: {e}")))
    }

    /// Register a new game, returns its id
    pub async fn create_game(&self, request: &CreateRequest) -> Result<String, ControllerError> {
        let response: CreateResponse = self.call(methods::CREATE, request).await?;
        Ok(response.id)
    }

    pub async fn start_game(&self, id: &str) -> Result<(), ControllerError> {
        let _: Empty = self
            .call(methods::START, &GameRequest { id: id.to_string() })
            .await?;
        Ok(())
    }

    pub async fn game_status(&self, id: &str) -> Result<StatusResponse, ControllerError> {
        self.call(methods::STATUS, &GameRequest { id: id.to_string() })
            .await
    }
}

#[async_trait]
impl Controller for ControllerClient {
    async fn ping(&self) -> Result<String, ControllerError> {
        let response: PingResponse = self.call(methods::PING, &Empty::default()).await?;
        Ok(response.version)
    }

    async fn poll(&self, worker_id: &str) -> Result<Option<Claim>, ControllerError> {
        let response: PollResponse = self
            .call(
                methods::POLL,
                &PollRequest {
                    worker_id: worker_id.to_string(),
                },
            )
            .await?;
        Ok(response.claim)
    }

    async fn submit_frame(
        &self,
        game_id: &str,
        token: &str,
        frame: &GameFrame,
    ) -> Result<GameStatus, ControllerError> {
        let response: SubmitFrameResponse = self
            .call(
                methods::SUBMIT_FRAME,
                &SubmitFrameRequest {
                    game_id: game_id.to_string(),
                    token: token.to_string(),
                    frame: frame.clone(),
                },
            )
            .await?;
        Ok(response.status)
    }

    async fn end_game(&self, game_id: &str, token: &str) -> Result<(), ControllerError> {
        let _: Empty = self
            .call(
                methods::END_GAME,
                &EndGameRequest {
                    game_id: game_id.to_string(),
                    token: token.to_string(),
                },
            )
            .await?;
        Ok(())
    }
}

/// `POST {base}/rpc/{method}` with a JSON body
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(mut base: Url) -> Result<Self, reqwest::Error> {
        // Url::join replaces the last segment unless the path ends in a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder().pool_max_idle_per_host(32).build()?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, call: Call) -> Result<Value, ControllerError> {
        let url = self
            .base
            .join(&format!("rpc/{}", call.method))
            .map_err(|e| ControllerError::Transport(e.to_string()))?;

        let remaining = call.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ControllerError::Timeout {
                method: call.method.to_string(),
            });
        }

        let response = self
            .client
            .post(url)
            .timeout(remaining)
            .json(&call.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ControllerError::Timeout {
                        method: call.method.to_string(),
                    }
                } else {
                    ControllerError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| ControllerError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::CONFLICT => ControllerError::StaleClaim(body),
            StatusCode::NOT_FOUND => ControllerError::NotFound(body),
            _ => ControllerError::Rejected {
                status: status.as_u16(),
                body,
            },
        })
    }
}
