//! Chat-Driven Input Dispatcher Library
//!
//! Reads a live chat channel over the IRC-based chat protocol with an
//! anonymous guest login, and turns matching chat messages into registered
//! input actions at a controlled rate.
//!
//! # Features
//! - Frame reassembly across partial socket reads
//! - Anonymous login, keep-alive replies, and channel join
//! - Reconnect with delay on read errors, server closes, and login timeouts
//! - Bounded backlog drained in proportion to elapsed time
//! - Bounded worker pool for command execution with per-task fault isolation
//! - Command definitions from JSON or `.ttk` files
//!
//! # Architecture
//! A single poll loop owns all protocol and queue state:
//! - `ConnectionManager` polls the socket and classifies frames
//! - `RateLimitedQueue` smooths bursts into a steady trickle
//! - `Dispatcher` runs released messages on blocking worker tasks
//! - `StopSignal` is the only state shared with the outside
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use chat_plays::{CommandRegistry, Config, LogInputSink, PollLoop, StopSignal};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_json(r#"{"channel": "somestreamer"}"#).unwrap();
//!     let registry = CommandRegistry::from_json(
//!         r#"[{"chat_text": "!jump", "actions": [{"type": "keyboard", "mode": "tap", "key": "SPACE"}]}]"#,
//!         Arc::new(LogInputSink),
//!     )
//!     .unwrap();
//!
//!     let poll = PollLoop::new(&config, Arc::new(registry), StopSignal::new()).unwrap();
//!     poll.run().await;
//! }
//! ```

pub mod command;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod message;
pub mod poller;
pub mod queue;
pub mod ttk;
pub mod types;

// Re-export main types for convenience
pub use command::{
    Action, Command, CommandExecutor, CommandRegistry, InputSink, KeyMode, LogInputSink,
    MouseButton, MouseMode,
};
pub use config::Config;
pub use connection::{
    ConnectionManager, ConnectionSettings, ConnectionState, ReconnectPolicy, ReconnectReason,
};
pub use dispatcher::{DispatchOutcome, Dispatcher, PruneReport};
pub use error::{ActionError, AppError, ConfigError};
pub use frame::{Frame, FrameParser};
pub use message::{classify, ChatEvent, ClientMessage, ServerEvent};
pub use poller::{PauseSwitch, PollLoop, StopSignal, TickSummary};
pub use queue::RateLimitedQueue;
pub use types::{ChannelName, GuestNick, SessionId};
