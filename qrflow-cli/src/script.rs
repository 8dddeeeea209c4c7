//! Edit scripts
//!
//! One command per line. Blank lines and lines starting with `#` are
//! skipped.
//!
//! ```text
//! # type a URL, pause, then render
//! form url https://example.com
//! wait 900ms
//! options {"size": 400, "fg_color": "#112233"}
//! intent on 1500ms
//! generate
//! state
//! ```

use std::time::Duration;

use libqrflow::{InputKind, OptionsPatch, QrflowError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `form <field> <value...>`; the value may be empty or contain spaces
    Form { field: String, value: String },
    /// `options <json>`
    Options(OptionsPatch),
    /// `type <kind>`
    Type(InputKind),
    /// `generate`
    Generate,
    /// `anyway`: generate despite a negative validation
    Anyway,
    /// `reset`
    Reset,
    /// `intent on|off [duration]`
    Intent {
        editing: bool,
        debounce: Option<Duration>,
    },
    /// `wait <duration>`
    Wait(Duration),
    /// `state`: print the current snapshot
    State,
}

/// Parse a whole script, reporting the first bad line
pub fn parse_script(source: &str) -> Result<Vec<Command>> {
    let mut commands = Vec::new();

    for (index, line) in source.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(command)) => commands.push(command),
            Ok(None) => {}
            Err(QrflowError::InvalidInput(message)) => {
                return Err(QrflowError::InvalidInput(format!(
                    "line {}: {}",
                    index + 1,
                    message
                )));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(commands)
}

/// Parse one line; `None` for blank lines and comments
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim_start()),
        None => (line, ""),
    };

    let command = match keyword {
        "form" => {
            let (field, value) = match rest.split_once(char::is_whitespace) {
                Some((field, value)) => (field, value.trim_start()),
                None => (rest, ""),
            };
            if field.is_empty() {
                return Err(invalid("form needs a field name"));
            }
            Command::Form {
                field: field.to_string(),
                value: value.to_string(),
            }
        }
        "options" => {
            if rest.is_empty() {
                return Err(invalid("options needs a JSON object"));
            }
            let patch: OptionsPatch = serde_json::from_str(rest)
                .map_err(|e| invalid(format!("bad options JSON: {}", e)))?;
            Command::Options(patch)
        }
        "type" => {
            let kind = rest.parse::<InputKind>().map_err(invalid)?;
            Command::Type(kind)
        }
        "generate" => no_arguments(rest, Command::Generate)?,
        "anyway" => no_arguments(rest, Command::Anyway)?,
        "reset" => no_arguments(rest, Command::Reset)?,
        "state" => no_arguments(rest, Command::State)?,
        "intent" => {
            let mut parts = rest.split_whitespace();
            let editing = match parts.next() {
                Some("on") => true,
                Some("off") => false,
                Some(other) => {
                    return Err(invalid(format!("intent expects on or off, got '{}'", other)))
                }
                None => return Err(invalid("intent expects on or off")),
            };
            let debounce = parts.next().map(parse_duration).transpose()?;
            if parts.next().is_some() {
                return Err(invalid("intent takes at most one duration"));
            }
            Command::Intent { editing, debounce }
        }
        "wait" => Command::Wait(parse_duration(rest)?),
        other => return Err(invalid(format!("unknown command '{}'", other))),
    };

    Ok(Some(command))
}

fn no_arguments(rest: &str, command: Command) -> Result<Command> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(invalid(format!("unexpected argument '{}'", rest)))
    }
}

fn parse_duration(input: &str) -> Result<Duration> {
    if input.is_empty() {
        return Err(invalid("missing duration"));
    }
    humantime::parse_duration(input).map_err(|e| invalid(format!("bad duration '{}': {}", input, e)))
}

fn invalid(message: impl Into<String>) -> QrflowError {
    QrflowError::InvalidInput(message.into())
}
