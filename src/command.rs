//! Registered chat commands
//!
//! A command maps an exact chat text to an ordered list of input actions.
//! The registry is read-only once built and is shared by every dispatch
//! task; the actual keyboard/mouse injection goes through [`InputSink`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ActionError, AppError};
use crate::ttk;

fn default_duration_ms() -> u64 {
    500
}

/// Key press style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// Press without releasing
    Hold,
    /// Release a held key
    Release,
    /// Press, wait `tap_ms`, release
    Tap,
}

/// Mouse operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseMode {
    /// Left click, at `x`,`y` when both are given
    LeftClick,
    /// Right click, at `x`,`y` when both are given
    RightClick,
    /// Middle click, at `x`,`y` when both are given
    MiddleClick,
    /// Move the pointer; missing coordinates count as 0
    Move,
}

/// Mouse button passed to the input sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Wheel button
    Middle,
}

/// One step of a command
///
/// Uses tagged enum with snake_case naming, e.g.
/// `{"type": "keyboard", "mode": "tap", "key": "SPACE", "tap_ms": 200}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Keyboard input by key name
    Keyboard {
        mode: KeyMode,
        key: String,
        #[serde(default = "default_duration_ms")]
        tap_ms: u64,
    },
    /// Mouse click (at `x`,`y` if given) or move (by/to `x`,`y`)
    Mouse {
        mode: MouseMode,
        #[serde(default)]
        x: Option<i32>,
        #[serde(default)]
        y: Option<i32>,
        #[serde(default)]
        relative: bool,
    },
    /// Pause before the next action
    Wait {
        #[serde(default = "default_duration_ms")]
        ms: u64,
    },
}

/// A chat trigger and the actions it runs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Command {
    pub chat_text: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Look up the hardware scan code for a key name (case-insensitive)
pub fn scan_code(name: &str) -> Option<u16> {
    let code = match name.to_ascii_uppercase().as_str() {
        "A" => 0x1E,
        "B" => 0x30,
        "C" => 0x2E,
        "D" => 0x20,
        "E" => 0x12,
        "F" => 0x21,
        "G" => 0x22,
        "H" => 0x23,
        "I" => 0x17,
        "J" => 0x24,
        "K" => 0x25,
        "L" => 0x26,
        "M" => 0x32,
        "N" => 0x31,
        "O" => 0x18,
        "P" => 0x19,
        "Q" => 0x10,
        "R" => 0x13,
        "S" => 0x1F,
        "T" => 0x14,
        "U" => 0x16,
        "V" => 0x2F,
        "W" => 0x11,
        "X" => 0x2D,
        "Y" => 0x15,
        "Z" => 0x2C,
        "1" => 0x02,
        "2" => 0x03,
        "3" => 0x04,
        "4" => 0x05,
        "5" => 0x06,
        "6" => 0x07,
        "7" => 0x08,
        "8" => 0x09,
        "9" => 0x0A,
        "0" => 0x0B,
        "-" => 0x0C,
        "=" => 0x0D,
        "[" => 0x1A,
        "]" => 0x1B,
        ";" => 0x27,
        "~" => 0x29,
        "," => 0x33,
        "." => 0x34,
        "F1" => 0x3B,
        "F2" => 0x3C,
        "F3" => 0x3D,
        "F4" => 0x3E,
        "F5" => 0x3F,
        "F6" => 0x40,
        "F7" => 0x41,
        "F8" => 0x42,
        "F9" => 0x43,
        "F10" => 0x44,
        "F11" => 0x57,
        "F12" => 0x58,
        "N1" => 0x4F,
        "N2" => 0x50,
        "N3" => 0x51,
        "N4" => 0x4B,
        "N5" => 0x4C,
        "N6" => 0x4D,
        "N7" => 0x47,
        "N8" => 0x48,
        "N9" => 0x49,
        "N0" => 0x52,
        "N-" => 0x4A,
        "N+" => 0x4E,
        "N." => 0x53,
        "ESC" => 0x01,
        "BKSP" => 0x0E,
        "TAB" => 0x0F,
        "ENTER" => 0x1C,
        "LCTRL" => 0x1D,
        "APOS" => 0x28,
        "LSHIFT" => 0x2A,
        "FDSLSH" => 0x2B,
        "BKSLSH" => 0x35,
        "RSHIFT" => 0x36,
        "PRTSCN" => 0x37,
        "LALT" => 0x38,
        "SPACE" => 0x39,
        "CAPS" => 0x3A,
        "NUMLCK" => 0x45,
        "DEL" => 0x53,
        "NENTER" => 0x9C,
        "NBKSLH" => 0xB5,
        "UP" => 0xC8,
        "LEFT" => 0xCB,
        "RIGHT" => 0xCD,
        "DOWN" => 0xD0,
        _ => return None,
    };
    Some(code)
}

/// Platform input injection
///
/// Implementations must be safe to call from several dispatch tasks at once.
pub trait InputSink: Send + Sync {
    fn key_down(&self, scan_code: u16) -> Result<(), ActionError>;
    fn key_up(&self, scan_code: u16) -> Result<(), ActionError>;
    fn mouse_click(
        &self,
        button: MouseButton,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<(), ActionError>;
    fn mouse_move(&self, x: i32, y: i32, relative: bool) -> Result<(), ActionError>;
}

/// Input sink that only logs what would be injected
#[derive(Debug, Default)]
pub struct LogInputSink;

impl InputSink for LogInputSink {
    fn key_down(&self, scan_code: u16) -> Result<(), ActionError> {
        info!("Key down 0x{:02X}", scan_code);
        Ok(())
    }

    fn key_up(&self, scan_code: u16) -> Result<(), ActionError> {
        info!("Key up 0x{:02X}", scan_code);
        Ok(())
    }

    fn mouse_click(
        &self,
        button: MouseButton,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<(), ActionError> {
        info!("Mouse {:?} click at {:?},{:?}", button, x, y);
        Ok(())
    }

    fn mouse_move(&self, x: i32, y: i32, relative: bool) -> Result<(), ActionError> {
        info!("Mouse move {},{} (relative: {})", x, y, relative);
        Ok(())
    }
}

/// Lookup-and-execute capability consumed by the dispatcher
///
/// Called concurrently from worker tasks; implementations only read shared state.
pub trait CommandExecutor: Send + Sync {
    /// Run every action registered for `text`, returning how many ran
    fn lookup_and_execute(&self, text: &str) -> Result<usize, ActionError>;
}

/// Chat text → actions mapping
///
/// Keys are lower-cased so matching is exact but case-insensitive.
/// Commands registered with the same text run one after another.
pub struct CommandRegistry {
    commands: HashMap<String, Vec<Action>>,
    sink: Arc<dyn InputSink>,
}

impl CommandRegistry {
    /// Create an empty registry injecting through `sink`
    pub fn new(sink: Arc<dyn InputSink>) -> Self {
        Self {
            commands: HashMap::new(),
            sink,
        }
    }

    /// Build a registry from command definitions
    pub fn from_commands(
        commands: impl IntoIterator<Item = Command>,
        sink: Arc<dyn InputSink>,
    ) -> Self {
        let mut registry = Self::new(sink);
        for command in commands {
            registry.register(command);
        }
        registry
    }

    /// Parse a JSON array of command definitions
    pub fn from_json(json: &str, sink: Arc<dyn InputSink>) -> Result<Self, AppError> {
        let commands: Vec<Command> = serde_json::from_str(json)?;
        Ok(Self::from_commands(commands, sink))
    }

    /// Load command definitions from a JSON file
    pub fn load(path: &Path, sink: Arc<dyn InputSink>) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&json, sink)?;
        info!(
            "Loaded {} commands from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Parse `.ttk` command file contents
    pub fn from_ttk(text: &str, sink: Arc<dyn InputSink>) -> Result<Self, AppError> {
        Ok(Self::from_commands(ttk::parse(text)?, sink))
    }

    /// Load command definitions from a `.ttk` file
    pub fn load_ttk(path: &Path, sink: Arc<dyn InputSink>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        let registry = Self::from_ttk(&text, sink)?;
        info!(
            "Loaded {} commands from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Load a command file, picking the format from its extension
    pub fn load_file(path: &Path, sink: Arc<dyn InputSink>) -> Result<Self, AppError> {
        let is_ttk = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ttk"));
        if is_ttk {
            Self::load_ttk(path, sink)
        } else {
            Self::load(path, sink)
        }
    }

    /// Add a command
    pub fn register(&mut self, command: Command) {
        debug!(
            "Registering command '{}' with {} actions",
            command.chat_text,
            command.actions.len()
        );
        self.commands
            .entry(command.chat_text.to_lowercase())
            .or_default()
            .extend(command.actions);
    }

    /// Number of distinct chat texts
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if no command is registered
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Actions registered for a chat text
    pub fn actions_for(&self, text: &str) -> Option<&[Action]> {
        self.commands.get(&text.to_lowercase()).map(Vec::as_slice)
    }

    fn run(&self, action: &Action) -> Result<(), ActionError> {
        match action {
            Action::Keyboard { mode, key, tap_ms } => {
                let code = scan_code(key).ok_or_else(|| ActionError::UnknownKey(key.clone()))?;
                match mode {
                    KeyMode::Hold => self.sink.key_down(code),
                    KeyMode::Release => self.sink.key_up(code),
                    KeyMode::Tap => {
                        self.sink.key_down(code)?;
                        thread::sleep(Duration::from_millis(*tap_ms));
                        self.sink.key_up(code)
                    }
                }
            }
            Action::Mouse {
                mode,
                x,
                y,
                relative,
            } => match mode {
                MouseMode::LeftClick => self.sink.mouse_click(MouseButton::Left, *x, *y),
                MouseMode::RightClick => self.sink.mouse_click(MouseButton::Right, *x, *y),
                MouseMode::MiddleClick => self.sink.mouse_click(MouseButton::Middle, *x, *y),
                MouseMode::Move => {
                    self.sink
                        .mouse_move(x.unwrap_or(0), y.unwrap_or(0), *relative)
                }
            },
            Action::Wait { ms } => {
                thread::sleep(Duration::from_millis(*ms));
                Ok(())
            }
        }
    }
}

impl CommandExecutor for CommandRegistry {
    fn lookup_and_execute(&self, text: &str) -> Result<usize, ActionError> {
        let Some(actions) = self.actions_for(text) else {
            return Ok(0);
        };

        debug!("Command '{}' matched, running {} actions", text, actions.len());
        for action in actions {
            self.run(action)?;
        }
        Ok(actions.len())
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}
