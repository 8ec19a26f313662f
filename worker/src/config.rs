use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::engine::RulesetRegistry;
use crate::retry::RetryPolicy;

const DEFAULT_WORKER_ID: &str = "worker";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid controller address {addr:?}: {reason}")]
    ControllerAddr { addr: String, reason: String },
    #[error("{flag} must be greater than zero")]
    Zero { flag: &'static str },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "engine-worker")]
#[command(about = "Claims games from the controller and runs them turn by turn")]
pub struct WorkerConfig {
    /// Number of games run concurrently
    #[arg(short = 't', long, env = "ENGINE_WORKER_THREADS", default_value_t = 10)]
    pub threads: usize,

    /// Controller base URL
    #[arg(
        short = 'c',
        long,
        env = "ENGINE_WORKER_CONTROLLER_ADDR",
        default_value = "http://127.0.0.1:3004"
    )]
    pub controller_addr: String,

    /// How often an idle slot polls for a game (e.g., "500ms", "1s")
    #[arg(
        short = 'p',
        long,
        env = "ENGINE_WORKER_POLL_INTERVAL",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub poll_interval: Duration,

    /// Delay every controller call by a random amount
    #[arg(long, env = "ENGINE_WORKER_CHAOS")]
    pub chaos: bool,

    /// Deadline for a single controller call
    #[arg(
        long,
        env = "ENGINE_WORKER_CALL_TIMEOUT",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub call_timeout: Duration,

    /// Attempts per controller call before giving up
    #[arg(long, env = "ENGINE_WORKER_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Wait after the first failed attempt, doubled after each further one
    #[arg(
        long,
        env = "ENGINE_WORKER_RETRY_BACKOFF",
        default_value = "100ms",
        value_parser = parse_duration
    )]
    pub retry_backoff: Duration,

    /// Directory of ruleset descriptors (defaults to ~/.battlesnake/rulesets)
    #[arg(long, env = "ENGINE_WORKER_RULESETS_DIR")]
    pub rulesets_dir: Option<PathBuf>,

    /// Name reported to the controller when polling (defaults to the hostname)
    #[arg(long, env = "ENGINE_WORKER_ID")]
    pub worker_id: Option<String>,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Zero { flag: "--threads" });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                flag: "--poll-interval",
            });
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::Zero {
                flag: "--call-timeout",
            });
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Zero {
                flag: "--retry-attempts",
            });
        }
        self.controller_url()?;
        Ok(())
    }

    pub fn controller_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::ControllerAddr {
            addr: self.controller_addr.clone(),
            reason,
        };

        let url = Url::parse(&self.controller_addr).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        }
        if url.host().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        Ok(url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_backoff: self.retry_backoff,
            max_backoff: RetryPolicy::default().max_backoff.max(self.retry_backoff),
        }
    }

    pub fn rulesets_dir(&self) -> Option<PathBuf> {
        self.rulesets_dir
            .clone()
            .or_else(RulesetRegistry::default_dir)
    }

    pub fn worker_id(&self) -> String {
        if let Some(id) = &self.worker_id {
            return id.clone();
        }
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_WORKER_ID.to_string())
    }
}

/// Parse a duration like "250ms", "30s", "5m" or "1h"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") {
        let millis: u64 = stripped
            .parse()
            .map_err(|_| "Invalid milliseconds".to_string())?;
        Ok(Duration::from_millis(millis))
    } else if let Some(stripped) = s.strip_suffix('s') {
        let secs: u64 = stripped
            .parse()
            .map_err(|_| "Invalid seconds".to_string())?;
        Ok(Duration::from_secs(secs))
    } else if let Some(stripped) = s.strip_suffix('m') {
        let mins: u64 = stripped
            .parse()
            .map_err(|_| "Invalid minutes".to_string())?;
        Ok(Duration::from_secs(mins * 60))
    } else if let Some(stripped) = s.strip_suffix('h') {
        let hours: u64 = stripped
            .parse()
            .map_err(|_| "Invalid hours".to_string())?;
        Ok(Duration::from_secs(hours * 3600))
    } else {
        Err("Duration must end with 'ms', 's', 'm', or 'h'".to_string())
    }
}
