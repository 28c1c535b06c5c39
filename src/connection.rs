//! Chat server connection
//!
//! Owns the TCP session: connect, anonymous login, short-timeout polling
//! reads, protocol replies, and reconnect-with-delay on any failure.
//! A broken session is never repaired; it is replaced by a fresh connect.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::frame::{Frame, FrameParser};
use crate::message::{classify, ChatEvent, ClientMessage, ServerEvent};
use crate::types::{ChannelName, GuestNick, SessionId};

/// Well-known chat server endpoint
pub const DEFAULT_SERVER_ADDR: &str = "irc.chat.twitch.tv:6667";

/// Bytes requested per socket read
const READ_CHUNK_SIZE: usize = 4096;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; set initially and after a failed connect
    Disconnected,
    /// TCP connect and login lines in progress
    Connecting,
    /// Login sent, waiting for the welcome numeric
    AwaitingLogin,
    /// Welcome received and JOIN sent
    LoggedIn,
    /// Waiting out a reconnect delay
    Reconnecting,
}

/// Why a session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectReason {
    /// Socket read/write failed, or no socket is open
    ReadError,
    /// Server closed the connection (zero-length read)
    PeerClosed,
    /// Login was not confirmed in time
    LoginTimeout,
}

/// Delay before reconnecting, per reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub read_error_delay: Duration,
    pub peer_closed_delay: Duration,
    pub login_timeout_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            read_error_delay: Duration::from_secs(1),
            peer_closed_delay: Duration::from_secs(5),
            login_timeout_delay: Duration::ZERO,
        }
    }
}

impl ReconnectReason {
    /// Delay this reason maps to under the given policy
    pub fn delay(self, policy: &ReconnectPolicy) -> Duration {
        match self {
            ReconnectReason::ReadError => policy.read_error_delay,
            ReconnectReason::PeerClosed => policy.peer_closed_delay,
            ReconnectReason::LoginTimeout => policy.login_timeout_delay,
        }
    }
}

/// Connection tuning
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// `host:port` of the chat server
    pub server_addr: String,
    /// How long one read waits before the poll gives up on more data
    pub read_timeout: Duration,
    /// How long to wait for the login numeric before reconnecting
    pub login_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            read_timeout: Duration::from_millis(16),
            login_timeout: Duration::from_secs(3),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Result of draining the socket once
enum ReadOutcome {
    /// Bytes that were immediately available (possibly none)
    Data(Vec<u8>),
    /// Zero-length read
    Closed,
    Failed(std::io::Error),
}

/// Owner of the chat server session
///
/// Used exclusively by the poll loop; nothing here is shared across tasks.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    stream: Option<TcpStream>,
    session: Option<SessionId>,
    channel: ChannelName,
    state: ConnectionState,
    login_started: Instant,
    parser: FrameParser,
    last_reconnect: Option<ReconnectReason>,
    reconnects: u64,
}

impl ConnectionManager {
    /// Create a disconnected manager
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            stream: None,
            session: None,
            channel: ChannelName(String::new()),
            state: ConnectionState::Disconnected,
            login_started: Instant::now(),
            parser: FrameParser::new(),
            last_reconnect: None,
            reconnects: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Id of the current (or last attempted) session
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Channel this manager joins
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Reason for the most recent reconnect, if any
    pub fn last_reconnect(&self) -> Option<ReconnectReason> {
        self.last_reconnect
    }

    /// Number of reconnects performed so far
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    /// Open a new session and send the anonymous login
    ///
    /// Any existing session is closed first and all per-session state is reset.
    /// On failure the manager is left Disconnected; the next poll reconnects.
    pub async fn connect(&mut self, channel: &ChannelName) -> Result<(), AppError> {
        self.stream = None;
        self.parser.reset();
        self.channel = channel.clone();
        self.state = ConnectionState::Connecting;
        self.login_started = Instant::now();

        let session = SessionId::new();
        self.session = Some(session);

        match self.open(session).await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ConnectionState::AwaitingLogin;
                self.login_started = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn open(&self, session: SessionId) -> Result<TcpStream, AppError> {
        info!(
            "Connecting to {} for #{} (session {})",
            self.settings.server_addr, self.channel, session
        );
        let mut stream = TcpStream::connect(&self.settings.server_addr).await?;

        let nick = GuestNick::generate();
        info!("Connected, logging in anonymously as {}", nick);
        let login = format!(
            "{}{}",
            ClientMessage::Pass.to_wire(),
            ClientMessage::Nick { nick }.to_wire()
        );
        stream.write_all(login.as_bytes()).await?;

        Ok(stream)
    }

    /// Wait `delay`, then connect again to the last known channel
    ///
    /// Blocks the caller (the poll loop) for the whole delay.
    pub async fn reconnect(&mut self, delay: Duration) {
        self.stream = None;
        self.state = ConnectionState::Reconnecting;
        self.reconnects += 1;

        if !delay.is_zero() {
            sleep(delay).await;
        }

        let channel = self.channel.clone();
        if let Err(e) = self.connect(&channel).await {
            error!("Reconnect to #{} failed: {}", channel, e);
        }
    }

    async fn reconnect_for(&mut self, reason: ReconnectReason) {
        self.last_reconnect = Some(reason);
        let delay = reason.delay(&self.settings.reconnect);
        self.reconnect(delay).await;
    }

    /// Drain all immediately available bytes and return the complete frames
    ///
    /// Read errors and server closes trigger a reconnect and yield no frames.
    pub async fn poll_once(&mut self) -> Vec<Frame> {
        let Some(stream) = self.stream.as_mut() else {
            warn!(
                "No open connection, reconnecting in {:?}",
                self.settings.reconnect.read_error_delay
            );
            self.reconnect_for(ReconnectReason::ReadError).await;
            return Vec::new();
        };

        match read_available(stream, self.settings.read_timeout).await {
            ReadOutcome::Data(bytes) if bytes.is_empty() => Vec::new(),
            ReadOutcome::Data(bytes) => self.parser.feed(&bytes),
            ReadOutcome::Failed(e) => {
                warn!(
                    "Unexpected connection error: {}. Reconnecting in {:?}",
                    e, self.settings.reconnect.read_error_delay
                );
                self.reconnect_for(ReconnectReason::ReadError).await;
                Vec::new()
            }
            ReadOutcome::Closed => {
                warn!(
                    "Connection closed by server. Reconnecting in {:?}",
                    self.settings.reconnect.peer_closed_delay
                );
                self.reconnect_for(ReconnectReason::PeerClosed).await;
                Vec::new()
            }
        }
    }

    /// Poll once, answer protocol frames, and return this tick's chat events
    ///
    /// Also enforces the login watchdog: if login has not been confirmed
    /// within the login timeout, the session is replaced immediately.
    pub async fn receive_chat_events(&mut self) -> Vec<ChatEvent> {
        let mut chats = Vec::new();

        for frame in self.poll_once().await {
            let result = match classify(frame) {
                ServerEvent::Chat(chat) => {
                    chats.push(chat);
                    Ok(())
                }
                ServerEvent::Ping => self.send(&ClientMessage::Pong).await,
                ServerEvent::LoginSuccess => {
                    info!("Successfully logged in. Joining channel #{}", self.channel);
                    self.state = ConnectionState::LoggedIn;
                    let join = ClientMessage::Join {
                        channel: self.channel.clone(),
                    };
                    self.send(&join).await
                }
                ServerEvent::Joined { channel } => {
                    info!("Successfully joined channel {}", channel);
                    Ok(())
                }
                ServerEvent::Notice { params, text } => {
                    info!("Server notice: {:?} {}", params, text);
                    Ok(())
                }
                ServerEvent::Ignored => Ok(()),
                ServerEvent::Unknown(frame) => {
                    debug!("Unhandled frame: {:?}", frame);
                    Ok(())
                }
            };

            if let Err(e) = result {
                warn!("Failed to write to server: {}", e);
                self.reconnect_for(ReconnectReason::ReadError).await;
                return chats;
            }
        }

        if self.login_expired() {
            warn!(
                "No login response within {:?}. Reconnecting...",
                self.settings.login_timeout
            );
            self.reconnect_for(ReconnectReason::LoginTimeout).await;
            return Vec::new();
        }

        chats
    }

    fn login_expired(&self) -> bool {
        self.state != ConnectionState::LoggedIn
            && self.login_started.elapsed() > self.settings.login_timeout
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<(), AppError> {
        let stream = self.stream.as_mut().ok_or(AppError::NotConnected)?;
        let wire = msg.to_wire();
        stream.write_all(wire.as_bytes()).await?;
        debug!("Sent {}", wire.trim_end());
        Ok(())
    }
}

/// Read until a read times out with nothing pending
async fn read_available(stream: &mut TcpStream, read_timeout: Duration) -> ReadOutcome {
    let mut received = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match timeout(read_timeout, stream.read(&mut chunk)).await {
            Err(_elapsed) => return ReadOutcome::Data(received),
            Ok(Ok(0)) => return ReadOutcome::Closed,
            Ok(Ok(n)) => received.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => return ReadOutcome::Failed(e),
        }
    }
}
