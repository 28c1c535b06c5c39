//! Basic type definitions for the chat dispatcher
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based identifier for one connect attempt
//! - `GuestNick`: randomized anonymous login name
//! - `ChannelName`: lower-cased channel name

use uuid::Uuid;

/// Identifier of a single connection session (newtype pattern)
///
/// A fresh id is issued on every connect, so log lines from a torn-down
/// session can be told apart from its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anonymous guest nickname (`justinfan` followed by five digits)
///
/// The server accepts any nick with this prefix as a read-only login.
/// Two sessions may draw the same number; nothing guards against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuestNick(pub String);

impl GuestNick {
    /// Prefix the server recognizes as an anonymous login
    pub const PREFIX: &'static str = "justinfan";

    /// Generate a new random guest nick
    pub fn generate() -> Self {
        use rand::Rng;
        let number: u32 = rand::thread_rng().gen_range(10000..=99999);
        Self(format!("{}{}", Self::PREFIX, number))
    }
}

impl std::fmt::Display for GuestNick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel name (lower-cased, without the leading `#`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(pub String);

impl ChannelName {
    /// Create a ChannelName from user input (trims, strips `#`, lower-cases)
    pub fn from_string(name: &str) -> Self {
        let name = name.trim();
        let name = name.strip_prefix('#').unwrap_or(name);
        Self(name.to_lowercase())
    }

    /// Check if the name is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
