//! Message protocol definitions
//!
//! Outbound wire frames sent to the chat server, and the typed events that
//! inbound frames are classified into.

use crate::frame::Frame;
use crate::types::{ChannelName, GuestNick};

/// Password sent with an anonymous login; the server ignores its value.
const ANONYMOUS_PASSWORD: &str = "asdf";

/// Host named in keep-alive replies.
const PONG_HOST: &str = "tmi.twitch.tv";

/// Numeric replies that carry only greeting, MOTD, or names-list boilerplate.
const BENIGN_NUMERICS: &[&str] = &["002", "003", "004", "353", "366", "372", "375", "376"];

/// Client → Server message
///
/// Every frame this client ever writes. Rendered with a CRLF terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Login password (placeholder for anonymous sessions)
    Pass,
    /// Login nickname
    Nick { nick: GuestNick },
    /// Join a channel's chat
    Join { channel: ChannelName },
    /// Keep-alive reply
    Pong,
}

impl ClientMessage {
    /// Serialize to the wire format, including the trailing CRLF
    pub fn to_wire(&self) -> String {
        match self {
            ClientMessage::Pass => format!("PASS {}\r\n", ANONYMOUS_PASSWORD),
            ClientMessage::Nick { nick } => format!("NICK {}\r\n", nick),
            ClientMessage::Join { channel } => format!("JOIN #{}\r\n", channel),
            ClientMessage::Pong => format!("PONG :{}\r\n", PONG_HOST),
        }
    }
}

/// A chat line from a viewer
///
/// Both fields are lower-cased on construction so command matching is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub username: String,
    pub message: String,
}

impl ChatEvent {
    /// Create a chat event, normalizing case
    pub fn new(username: &str, message: &str) -> Self {
        Self {
            username: username.to_lowercase(),
            message: message.to_lowercase(),
        }
    }
}

/// Server → Client event
///
/// The classified meaning of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Chat message from a viewer (the only event that reaches the queue)
    Chat(ChatEvent),
    /// Keep-alive ping, must be answered with a pong
    Ping,
    /// Login accepted (numeric 001), channel join should follow
    LoginSuccess,
    /// Channel join confirmed
    Joined { channel: String },
    /// Service notice from the server
    Notice { params: Vec<String>, text: String },
    /// Known boilerplate numeric, ignored silently
    Ignored,
    /// Anything else
    Unknown(Frame),
}

/// Classify a parsed frame by its command token
pub fn classify(frame: Frame) -> ServerEvent {
    match frame.command.as_str() {
        "PRIVMSG" => ServerEvent::Chat(ChatEvent::new(&frame.sender, &frame.trailing)),
        "PING" => ServerEvent::Ping,
        "001" => ServerEvent::LoginSuccess,
        "JOIN" => ServerEvent::Joined {
            channel: frame.params.into_iter().next().unwrap_or_default(),
        },
        "NOTICE" => ServerEvent::Notice {
            params: frame.params,
            text: frame.trailing,
        },
        cmd if BENIGN_NUMERICS.contains(&cmd) => ServerEvent::Ignored,
        _ => ServerEvent::Unknown(frame),
    }
}
