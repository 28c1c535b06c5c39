//! Poll loop
//!
//! The single control loop that owns the connection, the backlog, and the
//! dispatcher. Every tick it checks the stop signal, polls the socket,
//! queues new chat, releases the due slice, and hands it to the workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::command::CommandExecutor;
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::queue::RateLimitedQueue;
use crate::types::ChannelName;

/// Process-wide stop flag
///
/// Cloned into whatever may request shutdown (signal handler, control
/// plane, an emergency input detector); read once per tick by the loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the poll loop to stop
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check if a stop was requested
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Shared pause toggle
///
/// While paused the poll loop keeps ticking but neither reads the socket
/// nor releases queued messages; unread chat waits in the socket buffer.
#[derive(Debug, Clone, Default)]
pub struct PauseSwitch(Arc<AtomicBool>);

impl PauseSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Flip the switch, returning the new paused state
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counts from one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Chat events received from the server
    pub received: usize,
    /// Events released from the backlog
    pub released: usize,
    /// Released events accepted by the dispatcher
    pub dispatched: usize,
}

/// Owner of all poll-side state
pub struct PollLoop {
    channel: ChannelName,
    connection: ConnectionManager,
    queue: RateLimitedQueue,
    dispatcher: Dispatcher,
    stop: StopSignal,
    pause: PauseSwitch,
    tick_interval: Duration,
}

impl PollLoop {
    /// Build the loop from a config, validating it first
    pub fn new(
        config: &Config,
        executor: Arc<dyn CommandExecutor>,
        stop: StopSignal,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            channel: config.channel_name(),
            connection: ConnectionManager::new(config.connection_settings()),
            queue: RateLimitedQueue::new(config.max_queue_length, config.message_rate()),
            dispatcher: Dispatcher::new(executor, config.max_workers),
            stop,
            pause: PauseSwitch::new(),
            tick_interval: config.tick_interval(),
        })
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn queue(&self) -> &RateLimitedQueue {
        &self.queue
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle for pausing and resuming processing from outside the loop
    pub fn pause_switch(&self) -> PauseSwitch {
        self.pause.clone()
    }

    /// Open the initial session
    ///
    /// A failure is only logged: the next poll finds no socket and reconnects.
    pub async fn connect(&mut self) {
        if let Err(e) = self.connection.connect(&self.channel).await {
            warn!("Initial connection to #{} failed: {}", self.channel, e);
        }
    }

    /// Run one poll/enqueue/drain/dispatch pass
    ///
    /// When paused, only finished dispatch tasks are collected.
    pub async fn tick(&mut self) -> TickSummary {
        self.dispatcher.prune();
        if self.pause.is_paused() {
            return TickSummary::default();
        }

        let events = self.connection.receive_chat_events().await;
        let received = events.len();
        if received > 0 {
            self.queue.enqueue(events);
        }

        let released = self.queue.drain_tick(Instant::now());
        let released_count = released.len();
        let dispatched = if released.is_empty() {
            0
        } else {
            self.dispatcher.dispatch(released, self.queue.len())
        };

        TickSummary {
            received,
            released: released_count,
            dispatched,
        }
    }

    /// Connect, then tick until the stop signal is seen
    ///
    /// In-flight dispatch tasks are not waited for.
    pub async fn run(mut self) {
        info!("Poll loop started for #{}", self.channel);
        self.connect().await;

        while !self.stop.is_triggered() {
            sleep(self.tick_interval).await;
            self.tick().await;
        }

        info!(
            "Stop requested, poll loop exiting ({} dispatch tasks still running)",
            self.dispatcher.active_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use crate::connection::ConnectionState;
    use crate::error::ActionError;

    /// Records every text it is asked to execute
    #[derive(Default)]
    struct RecordingExecutor {
        texts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl CommandExecutor for RecordingExecutor {
        fn lookup_and_execute(&self, text: &str) -> Result<usize, ActionError> {
            self.texts.lock().unwrap().push(text.to_string());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    async fn test_config() -> (TcpListener, Config) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = Config {
            channel: "Streamer".to_string(),
            server_addr: listener.local_addr().unwrap().to_string(),
            read_timeout_ms: 150,
            tick_interval_ms: 10,
            ..Config::default()
        };
        (listener, config)
    }

    fn privmsg(user: &str, text: &str) -> String {
        format!(":{0}!{0}@{0}.tmi.twitch.tv PRIVMSG #streamer :{1}\r\n", user, text)
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        assert!(!stop.is_triggered());
        remote.trigger();
        assert!(stop.is_triggered());
    }

    #[test]
    fn test_pause_switch_toggle() {
        let pause = PauseSwitch::new();
        let remote = pause.clone();
        assert!(!pause.is_paused());
        assert!(remote.toggle());
        assert!(pause.is_paused());
        assert!(!pause.toggle());
        remote.pause();
        assert!(pause.is_paused());
        remote.resume();
        assert!(!pause.is_paused());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config {
            channel: "streamer".to_string(),
            max_workers: 0,
            ..Config::default()
        };
        let result = PollLoop::new(
            &config,
            Arc::new(RecordingExecutor::default()),
            StopSignal::new(),
        );
        assert!(matches!(result, Err(ConfigError::ZeroWorkers)));
    }

    #[tokio::test]
    async fn test_chat_flows_to_executor() {
        let (listener, mut config) = test_config().await;
        config.message_rate_secs = 0.0;
        let executor = Arc::new(RecordingExecutor::default());
        let mut poll = PollLoop::new(&config, executor.clone(), StopSignal::new()).unwrap();

        poll.connect().await;
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        reader.read_line(&mut line).await.unwrap();

        let burst = format!(
            ":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!\r\n{}{}",
            privmsg("viewer1", "!JUMP"),
            privmsg("viewer2", "hello")
        );
        write.write_all(burst.as_bytes()).await.unwrap();

        let summary = poll.tick().await;
        assert_eq!(
            summary,
            TickSummary {
                received: 2,
                released: 2,
                dispatched: 2,
            }
        );
        assert_eq!(poll.connection().state(), ConnectionState::LoggedIn);

        for _ in 0..200 {
            if executor.calls.load(Ordering::SeqCst) == 2 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        let mut texts = executor.texts.lock().unwrap().clone();
        texts.sort();
        assert_eq!(texts, vec!["!jump", "hello"]);
    }

    #[tokio::test]
    async fn test_paused_loop_leaves_chat_unread() {
        let (listener, mut config) = test_config().await;
        config.message_rate_secs = 0.0;
        let executor = Arc::new(RecordingExecutor::default());
        let mut poll = PollLoop::new(&config, executor.clone(), StopSignal::new()).unwrap();
        let pause = poll.pause_switch();

        poll.connect().await;
        let (socket, _) = listener.accept().await.unwrap();
        let (_read, mut write) = socket.into_split();
        let burst = format!(
            ":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!\r\n{}",
            privmsg("viewer1", "!jump")
        );
        write.write_all(burst.as_bytes()).await.unwrap();

        pause.pause();
        assert_eq!(poll.tick().await, TickSummary::default());
        assert_eq!(poll.connection().state(), ConnectionState::AwaitingLogin);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

        pause.resume();
        let summary = poll.tick().await;
        assert_eq!(summary.received, 1);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(poll.connection().state(), ConnectionState::LoggedIn);
    }

    #[tokio::test]
    async fn test_burst_is_truncated_to_backlog() {
        let (listener, mut config) = test_config().await;
        config.max_queue_length = 20;
        config.message_rate_secs = 1000.0;
        let mut poll = PollLoop::new(
            &config,
            Arc::new(RecordingExecutor::default()),
            StopSignal::new(),
        )
        .unwrap();

        poll.connect().await;
        let (socket, _) = listener.accept().await.unwrap();
        let (_read, mut write) = socket.into_split();

        let mut burst = String::from(":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!\r\n");
        for i in 0..25 {
            burst.push_str(&privmsg(&format!("viewer{}", i), &format!("msg{}", i)));
        }
        write.write_all(burst.as_bytes()).await.unwrap();

        let summary = poll.tick().await;
        assert_eq!(summary.received, 25);
        assert_eq!(summary.released, 0);

        let queued: Vec<_> = poll.queue().iter().map(|e| e.message.clone()).collect();
        let expected: Vec<_> = (5..25).map(|i| format!("msg{}", i)).collect();
        assert_eq!(queued, expected);
    }

    #[tokio::test]
    async fn test_run_returns_when_stopped() {
        let (_listener, config) = test_config().await;
        let stop = StopSignal::new();
        let poll = PollLoop::new(
            &config,
            Arc::new(RecordingExecutor::default()),
            stop.clone(),
        )
        .unwrap();

        let handle = tokio::spawn(poll.run());
        sleep(Duration::from_millis(50)).await;
        stop.trigger();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poll loop did not stop")
            .unwrap();
    }
}
