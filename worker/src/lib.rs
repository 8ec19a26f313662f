pub mod config;
pub mod controller;
pub mod engine;
pub mod game_runner;
pub mod retry;
pub mod snake_client;
pub mod telemetry;
pub mod worker;

pub use config::WorkerConfig;
pub use game_runner::{GameRunner, RunOutcome, TickRunner};
pub use worker::Worker;
