//! Policies wrapped around every controller call.
//!
//! Interceptors run in the order they were added to the client, each one
//! deciding whether and when to hand the call to the rest of the chain. The
//! transport sits at the end of the chain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tokio::time::Instant;

use super::ControllerError;
use super::client::Transport;

/// One outbound call on its way to the controller
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub body: Value,
    /// The call fails with a timeout once this passes
    pub deadline: Instant,
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, call: Call, next: Next<'_>) -> Result<Value, ControllerError>;
}

/// The remainder of the chain after the current interceptor
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn new(interceptors: &'a [Arc<dyn Interceptor>], transport: &'a dyn Transport) -> Self {
        Self {
            interceptors,
            transport,
        }
    }

    pub async fn run(self, call: Call) -> Result<Value, ControllerError> {
        match self.interceptors.split_first() {
            Some((first, rest)) => first.intercept(call, Next::new(rest, self.transport)).await,
            None => self.transport.invoke(call).await,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub timeouts: u64,
}

/// Counts calls and emits one `controller_call` metric event per call
#[derive(Debug, Default)]
pub struct MetricsInterceptor {
    calls: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

impl MetricsInterceptor {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Interceptor for MetricsInterceptor {
    async fn intercept(&self, call: Call, next: Next<'_>) -> Result<Value, ControllerError> {
        let method = call.method;
        let start = Instant::now();

        let result = next.run(call).await;

        self.calls.fetch_add(1, Ordering::Relaxed);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(ControllerError::Timeout { .. }) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                "timeout"
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                "error"
            }
        };

        tracing::debug!(
            metric_type = "controller_call",
            method,
            outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "controller call"
        );

        result
    }
}

enum DelaySource {
    Random(Mutex<StdRng>),
    Fixed(Duration),
}

/// Delays every call before it is issued, so lease and retry handling gets
/// exercised with slow and reordered calls. About one call in five waits
/// whole seconds, the rest wait up to 50ms. A call whose deadline passes
/// while waiting fails with a timeout and is never sent.
pub struct ChaosInterceptor {
    delays: DelaySource,
}

impl Default for ChaosInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChaosInterceptor {
    pub fn new() -> Self {
        Self {
            delays: DelaySource::Random(Mutex::new(StdRng::from_entropy())),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            delays: DelaySource::Random(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn with_fixed_delay(delay: Duration) -> Self {
        Self {
            delays: DelaySource::Fixed(delay),
        }
    }

    pub fn next_delay(&self) -> Duration {
        match &self.delays {
            DelaySource::Fixed(delay) => *delay,
            DelaySource::Random(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                if rng.gen_range(0..100) <= 20 {
                    Duration::from_secs(rng.gen_range(0..5))
                } else {
                    Duration::from_millis(rng.gen_range(0..50))
                }
            }
        }
    }
}

#[async_trait]
impl Interceptor for ChaosInterceptor {
    async fn intercept(&self, call: Call, next: Next<'_>) -> Result<Value, ControllerError> {
        let delay = self.next_delay();

        tokio::select! {
            biased;
            _ = tokio::time::sleep_until(call.deadline) => {
                tracing::debug!(method = call.method, delay_ms = delay.as_millis() as u64, "Chaos delay outlived the call deadline");
                return Err(ControllerError::Timeout {
                    method: call.method.to_string(),
                });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        next.run(call).await
    }
}
