//! Frame reassembly
//!
//! Splits the raw byte stream from the chat server into protocol frames:
//!   [`:`sender-prefix SPACE] command [SPACE params] [SPACE `:` trailing] CRLF
//!
//! Frames may arrive split across reads, so the parser keeps the bytes of an
//! unfinished frame and prepends them to the next chunk.

use tracing::{debug, warn};

/// Upper bound on retained partial bytes before they are thrown away.
pub const MAX_PARTIAL_BYTES: usize = 64 * 1024;

/// One parsed protocol line
///
/// Fields are decoded lossily: invalid UTF-8 becomes U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Nick part of a `nick!user@host` prefix, empty otherwise
    pub sender: String,
    /// Command token (`PRIVMSG`, `PING`, `001`, ...)
    pub command: String,
    /// Space-separated middle parameters
    pub params: Vec<String>,
    /// Text after ` :`, empty if absent
    pub trailing: String,
}

/// Incremental frame parser holding the unfinished tail of the stream
#[derive(Debug, Default)]
pub struct FrameParser {
    partial: Vec<u8>,
}

impl FrameParser {
    /// Create a parser with an empty partial buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes retained from previous calls
    pub fn partial(&self) -> &[u8] {
        &self.partial
    }

    /// Drop any retained bytes (used when the connection is replaced)
    pub fn reset(&mut self) {
        self.partial.clear();
    }

    /// Feed newly received bytes and return every complete frame, in stream order
    ///
    /// If no frame is complete, the whole buffer is kept for the next call.
    /// Otherwise only the bytes after the last complete frame are kept.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut buffer = std::mem::take(&mut self.partial);
        buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut first_start = None;
        let mut last_end = 0;
        let mut line_start = 0;

        while let Some(pos) = find_crlf(&buffer[line_start..]) {
            let line_end = line_start + pos;
            // A bare LF also ends a line; only the text after the last one can be a frame.
            let frame_start = buffer[line_start..line_end]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(line_start, |lf| line_start + lf + 1);
            match parse_line(&buffer[frame_start..line_end]) {
                Some(frame) => {
                    first_start.get_or_insert(frame_start);
                    frames.push(frame);
                    last_end = line_end + 2;
                }
                None => {
                    debug!(
                        "Skipping malformed line: {:?}",
                        String::from_utf8_lossy(&buffer[frame_start..line_end])
                    );
                }
            }
            line_start = line_end + 2;
        }

        match first_start {
            None => self.partial = buffer,
            Some(start) => {
                if start != 0 {
                    warn!(
                        "Frame stream out of sync: discarding {} bytes before first frame",
                        start
                    );
                }
                self.partial = buffer.split_off(last_end);
            }
        }

        if self.partial.len() > MAX_PARTIAL_BYTES {
            warn!(
                "Partial frame exceeds {} bytes without a line ending, discarding",
                MAX_PARTIAL_BYTES
            );
            self.partial.clear();
        }

        frames
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse one line (without its CRLF). Returns None if the line does not fit
/// the frame grammar.
fn parse_line(line: &[u8]) -> Option<Frame> {
    if line.iter().any(|&b| b == b'\r' || b == b'\n') {
        return None;
    }

    // A leading `:` only starts a prefix if a command follows it.
    let (sender, rest) = match line.strip_prefix(b":") {
        Some(after) => match after.iter().position(|&b| b == b' ') {
            Some(space) => (sender_nick(&after[..space]), &after[space + 1..]),
            None => (String::new(), line),
        },
        None => (String::new(), line),
    };

    let command_len = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    if command_len == 0 {
        return None;
    }
    let command = decode(&rest[..command_len]);

    let (middle, trailing) = split_tail(&rest[command_len..])?;

    let params = match middle {
        Some(middle) if !middle.is_empty() => middle.split(|&b| b == b' ').map(decode).collect(),
        _ => Vec::new(),
    };

    Some(Frame {
        sender,
        command,
        params,
        trailing: trailing.map(decode).unwrap_or_default(),
    })
}

/// Split what follows the command into middle params and trailing text.
///
/// Middle params never contain `:`; the first `:` must be preceded by a space
/// and starts the trailing text.
fn split_tail(tail: &[u8]) -> Option<(Option<&[u8]>, Option<&[u8]>)> {
    if tail.is_empty() {
        return Some((None, None));
    }
    if tail[0] != b' ' {
        return None;
    }

    match tail.iter().position(|&b| b == b':') {
        None => Some((Some(&tail[1..]), None)),
        Some(colon) if tail[colon - 1] != b' ' => None,
        Some(1) => Some((None, Some(&tail[2..]))),
        Some(colon) => Some((Some(&tail[1..colon - 1]), Some(&tail[colon + 1..]))),
    }
}

/// Extract `nick` from a `nick!user@host` prefix; server prefixes give "".
fn sender_nick(prefix: &[u8]) -> String {
    match prefix.iter().position(|&b| b == b'!') {
        Some(bang) if bang > 0 => decode(&prefix[..bang]),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVMSG: &[u8] = b":viewer1!viewer1@viewer1.tmi.twitch.tv PRIVMSG #streamer :!JUMP\r\n";

    #[test]
    fn test_parse_chat_message() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(PRIVMSG);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sender, "viewer1");
        assert_eq!(frames[0].command, "PRIVMSG");
        assert_eq!(frames[0].params, vec!["#streamer"]);
        assert_eq!(frames[0].trailing, "!JUMP");
        assert!(parser.partial().is_empty());
    }

    #[test]
    fn test_parse_ping_without_prefix() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"PING :tmi.twitch.tv\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sender, "");
        assert_eq!(frames[0].command, "PING");
        assert!(frames[0].params.is_empty());
        assert_eq!(frames[0].trailing, "tmi.twitch.tv");
    }

    #[test]
    fn test_server_prefix_has_no_sender() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b":tmi.twitch.tv 001 justinfan12345 :Welcome, GLHF!\r\n");

        assert_eq!(frames[0].sender, "");
        assert_eq!(frames[0].command, "001");
        assert_eq!(frames[0].params, vec!["justinfan12345"]);
        assert_eq!(frames[0].trailing, "Welcome, GLHF!");
    }

    #[test]
    fn test_multiple_params() {
        let mut parser = FrameParser::new();
        let frames =
            parser.feed(b":justinfan1.tmi.twitch.tv 353 justinfan1 = #streamer :justinfan1\r\n");

        assert_eq!(frames[0].command, "353");
        assert_eq!(frames[0].params, vec!["justinfan1", "=", "#streamer"]);
    }

    #[test]
    fn test_frames_keep_stream_order() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"PING :a\r\nPING :b\r\nPING :c\r\n");
        let trailing: Vec<_> = frames.iter().map(|f| f.trailing.as_str()).collect();
        assert_eq!(trailing, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_anywhere_matches_single_chunk() {
        let stream: Vec<u8> = [
            PRIVMSG,
            b"PING :tmi.twitch.tv\r\n".as_slice(),
            b":tmi.twitch.tv 372 justinfan1 :You are in a maze of twisty passages.\r\n".as_slice(),
        ]
        .concat();

        let expected = FrameParser::new().feed(&stream);
        assert_eq!(expected.len(), 3);

        for split in 1..stream.len() {
            let mut parser = FrameParser::new();
            let mut frames = parser.feed(&stream[..split]);
            frames.extend(parser.feed(&stream[split..]));
            assert_eq!(frames, expected, "split at byte {}", split);
            assert!(parser.partial().is_empty());
        }
    }

    #[test]
    fn test_incomplete_frame_is_retained() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"PING :tmi.tw").is_empty());
        assert_eq!(parser.partial(), b"PING :tmi.tw");

        let frames = parser.feed(b"itch.tv\r\nPRIV");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].trailing, "tmi.twitch.tv");
        assert_eq!(parser.partial(), b"PRIV");
    }

    #[test]
    fn test_leading_garbage_is_dropped() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"garbage x:y\r\nPING :x\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "PING");
        assert!(parser.partial().is_empty());
    }

    #[test]
    fn test_frame_after_bare_lf_is_recovered() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"junk\nPING :tmi.twitch.tv\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "PING");
        assert_eq!(frames[0].trailing, "tmi.twitch.tv");
        assert!(parser.partial().is_empty());

        let frames = parser.feed(b"PING :a\r\nx\ny\nPING :b\r\n");
        let trailing: Vec<_> = frames.iter().map(|f| f.trailing.as_str()).collect();
        assert_eq!(trailing, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b":a!a@a PRIVMSG #c :caf\xff\r\n");
        assert_eq!(frames[0].trailing, "caf\u{FFFD}");
    }

    #[test]
    fn test_reset_clears_partial() {
        let mut parser = FrameParser::new();
        parser.feed(b"PING");
        parser.reset();
        assert!(parser.partial().is_empty());
    }

    #[test]
    fn test_oversized_partial_is_discarded() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(&vec![b'A'; MAX_PARTIAL_BYTES + 1]);
        assert!(frames.is_empty());
        assert!(parser.partial().is_empty());
    }
}
