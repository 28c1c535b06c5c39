//! Error types for the chat dispatcher
//!
//! Defines application-level errors, configuration errors, and the
//! per-task action errors returned by dispatched work.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Socket faults never escape the poll loop (they are turned into
/// reconnects), so these mostly surface during startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (socket or file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error in a command file
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Command file row that does not describe a command or action
    #[error("Invalid command file: {0}")]
    CommandFile(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Operation needs a live socket but none is open
    #[error("Not connected")]
    NotConnected,
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Channel name is empty after trimming
    #[error("channel name must not be empty")]
    EmptyChannel,

    /// Backlog length must be positive
    #[error("max_queue_length must be at least 1")]
    ZeroQueueLength,

    /// Worker cap must be positive
    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    /// Drain rate must convert to a `Duration`
    #[error("message_rate_secs must be a non-negative number of seconds within range, got {0}")]
    InvalidRate(f64),
}

/// Errors raised while executing a command's actions
///
/// Returned as a value from each dispatch task and inspected when the
/// dispatcher prunes completed tasks.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Key name is not in the scan-code table
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// The input backend refused or failed the injection
    #[error("input backend error: {0}")]
    Input(String),
}
