//! Chat-Driven Input Dispatcher - Entry Point
//!
//! Loads the config and command definitions, then runs the poll loop until
//! Ctrl-C. Lines read from stdin pause and resume processing.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_plays::{CommandRegistry, Config, LogInputSink, PollLoop, StopSignal};

/// Default config file path
const DEFAULT_CONFIG_PATH: &str = "chat_plays.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_plays=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_plays=info")),
        )
        .init();

    // Usage: chat_plays [config.json] [channel]
    let config_path = PathBuf::from(
        env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
    );
    let channel_arg = env::args().nth(2);

    let mut config = if config_path.exists() || channel_arg.is_none() {
        Config::load(&config_path)?
    } else {
        warn!(
            "Config file {} not found, using defaults",
            config_path.display()
        );
        Config::default()
    };
    if let Some(channel) = channel_arg {
        config.channel = channel;
    }

    let sink = Arc::new(LogInputSink);
    let registry = match &config.commands_path {
        Some(path) => CommandRegistry::load_file(path, sink)?,
        None => {
            warn!("No commands_path configured, no chat commands will match");
            CommandRegistry::new(sink)
        }
    };

    let stop = StopSignal::new();
    let poll = PollLoop::new(&config, Arc::new(registry), stop.clone())?;

    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping");
                ctrl_c_stop.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    // Typing "p" (or "pause"/"resume") on stdin toggles processing.
    let pause = poll.pause_switch();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "p" => {
                    let paused = pause.toggle();
                    info!("Processing {}", if paused { "paused" } else { "resumed" });
                }
                "pause" => {
                    pause.pause();
                    info!("Processing paused");
                }
                "resume" => {
                    pause.resume();
                    info!("Processing resumed");
                }
                _ => {}
            }
        }
    });

    poll.run().await;

    // Exit without waiting on the blocking pool: in-flight actions are abandoned.
    std::process::exit(0);
}
