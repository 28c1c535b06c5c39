//! Runtime configuration
//!
//! Loaded from a JSON file. Every field except `channel` has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::connection::{ConnectionSettings, ReconnectPolicy, DEFAULT_SERVER_ADDR};
use crate::error::{AppError, ConfigError};
use crate::types::ChannelName;

fn default_server_addr() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}

fn default_max_queue_length() -> usize {
    20
}

fn default_message_rate_secs() -> f64 {
    0.5
}

fn default_max_workers() -> usize {
    100
}

fn default_login_timeout_secs() -> u64 {
    3
}

fn default_read_timeout_ms() -> u64 {
    16
}

fn default_tick_interval_ms() -> u64 {
    100
}

/// Dispatcher configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Channel to read chat from (case-insensitive, `#` optional)
    #[serde(default)]
    pub channel: String,
    /// `host:port` of the chat server
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// Most recent messages kept in the backlog
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,
    /// Seconds a full backlog takes to drain; 0 releases everything at once
    #[serde(default = "default_message_rate_secs")]
    pub message_rate_secs: f64,
    /// Maximum dispatch tasks in flight
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Seconds to wait for login confirmation before reconnecting
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
    /// Milliseconds one socket read may wait
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Milliseconds between poll loop ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Command definitions: `.ttk` (CSV) files, anything else is read as JSON
    #[serde(default)]
    pub commands_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: String::new(),
            server_addr: default_server_addr(),
            max_queue_length: default_max_queue_length(),
            message_rate_secs: default_message_rate_secs(),
            max_workers: default_max_workers(),
            login_timeout_secs: default_login_timeout_secs(),
            read_timeout_ms: default_read_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            commands_path: None,
        }
    }
}

impl Config {
    /// Parse configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the values the poll loop relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_name().is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        if self.max_queue_length == 0 {
            return Err(ConfigError::ZeroQueueLength);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if Duration::try_from_secs_f64(self.message_rate_secs).is_err() {
            return Err(ConfigError::InvalidRate(self.message_rate_secs));
        }
        Ok(())
    }

    /// Normalized channel name
    pub fn channel_name(&self) -> ChannelName {
        ChannelName::from_string(&self.channel)
    }

    /// Backlog drain rate
    ///
    /// Only meaningful after `validate` has accepted the rate; an
    /// unrepresentable rate reads as zero.
    pub fn message_rate(&self) -> Duration {
        Duration::try_from_secs_f64(self.message_rate_secs).unwrap_or_default()
    }

    /// Poll loop tick interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Connection settings derived from this config
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            server_addr: self.server_addr.clone(),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            login_timeout: Duration::from_secs(self.login_timeout_secs),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
