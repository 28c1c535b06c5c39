//! `.ttk` command files
//!
//! CSV with `|` as the quote character. A `command,<chat text>,<n>` row is
//! followed by `n` action rows:
//!
//! ```text
//! keyboard,<hold|release|tap>,<tap_ms>,<key>
//! mouse,<lc|rc|mc|move>,<x>,<y>,<hold_ms>,<relative 0|1>
//! wait,<ms>
//! ```
//!
//! Rows outside a command block are ignored. Empty mouse coordinates mean
//! "current position" for clicks and 0 for moves.

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::debug;

use crate::command::{Action, Command, KeyMode, MouseMode};
use crate::error::AppError;

const QUOTE: u8 = b'|';

/// Written for the mouse hold column, which clicks do not use
const MOUSE_HOLD_MS: &str = "500";

/// Parse the contents of a `.ttk` file
pub fn parse(text: &str) -> Result<Vec<Command>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote(QUOTE)
        .from_reader(text.as_bytes());

    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

    let mut commands = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        if field(row, 0) != "command" {
            continue;
        }
        let line = index + 1;
        let count: usize = field(row, 2)
            .trim()
            .parse()
            .map_err(|_| invalid(line, "action count is not a number"))?;

        let first = index + 1;
        let last = first.saturating_add(count).min(rows.len());
        let actions = rows[first..last]
            .iter()
            .zip(first + 1..)
            .map(|(row, line)| parse_action(row, line))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Read command '{}' with {} actions",
            field(row, 1),
            actions.len()
        );
        commands.push(Command {
            chat_text: field(row, 1).to_string(),
            actions,
        });
    }
    Ok(commands)
}

/// Render commands in `.ttk` form
pub fn render(commands: &[Command]) -> Result<String, AppError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote(QUOTE)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    for command in commands {
        let count = command.actions.len().to_string();
        writer.write_record(["command", command.chat_text.as_str(), count.as_str()])?;
        for action in &command.actions {
            writer.write_record(action_row(action))?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::CommandFile(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::CommandFile(e.to_string()))
}

fn field(row: &StringRecord, index: usize) -> &str {
    row.get(index).unwrap_or("")
}

fn invalid(line: usize, reason: &str) -> AppError {
    AppError::CommandFile(format!("row {}: {}", line, reason))
}

fn parse_ms(value: &str, line: usize) -> Result<u64, AppError> {
    match value.trim() {
        "" => Ok(500),
        ms => ms
            .parse()
            .map_err(|_| invalid(line, "duration is not a number")),
    }
}

fn parse_coord(value: &str, line: usize) -> Result<Option<i32>, AppError> {
    match value.trim() {
        "" => Ok(None),
        coord => coord
            .parse()
            .map(Some)
            .map_err(|_| invalid(line, "coordinate is not a number")),
    }
}

fn parse_action(row: &StringRecord, line: usize) -> Result<Action, AppError> {
    match field(row, 0) {
        "keyboard" => {
            let mode = match field(row, 1) {
                "hold" => KeyMode::Hold,
                "release" => KeyMode::Release,
                "tap" => KeyMode::Tap,
                other => return Err(invalid(line, &format!("unknown key mode '{}'", other))),
            };
            Ok(Action::Keyboard {
                mode,
                tap_ms: parse_ms(field(row, 2), line)?,
                key: field(row, 3).to_string(),
            })
        }
        "mouse" => {
            let mode = match field(row, 1) {
                "lc" => MouseMode::LeftClick,
                "rc" => MouseMode::RightClick,
                "mc" => MouseMode::MiddleClick,
                "move" => MouseMode::Move,
                other => return Err(invalid(line, &format!("unknown mouse mode '{}'", other))),
            };
            Ok(Action::Mouse {
                mode,
                x: parse_coord(field(row, 2), line)?,
                y: parse_coord(field(row, 3), line)?,
                relative: matches!(field(row, 5).trim(), "1" | "True" | "true"),
            })
        }
        "wait" => Ok(Action::Wait {
            ms: parse_ms(field(row, 1), line)?,
        }),
        other => Err(invalid(line, &format!("unknown action type '{}'", other))),
    }
}

fn action_row(action: &Action) -> Vec<String> {
    match action {
        Action::Keyboard { mode, key, tap_ms } => {
            let mode = match mode {
                KeyMode::Hold => "hold",
                KeyMode::Release => "release",
                KeyMode::Tap => "tap",
            };
            vec![
                "keyboard".to_string(),
                mode.to_string(),
                tap_ms.to_string(),
                key.clone(),
            ]
        }
        Action::Mouse {
            mode,
            x,
            y,
            relative,
        } => {
            let mode = match mode {
                MouseMode::LeftClick => "lc",
                MouseMode::RightClick => "rc",
                MouseMode::MiddleClick => "mc",
                MouseMode::Move => "move",
            };
            let coord = |c: &Option<i32>| c.map(|v| v.to_string()).unwrap_or_default();
            vec![
                "mouse".to_string(),
                mode.to_string(),
                coord(x),
                coord(y),
                MOUSE_HOLD_MS.to_string(),
                if *relative { "1" } else { "0" }.to_string(),
            ]
        }
        Action::Wait { ms } => vec!["wait".to_string(), ms.to_string()],
    }
}
