//! Rendering of notifications and snapshots for stdout

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Local};
use libqrflow::{Notification, Snapshot};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One human-readable line per notification
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: '{}'. Valid formats: text, json", s)),
        }
    }
}

#[derive(Serialize)]
struct Stamped<'a> {
    at: String,
    #[serde(flatten)]
    notification: &'a Notification,
}

pub fn render_notification(
    format: OutputFormat,
    notification: &Notification,
    at: DateTime<Local>,
) -> String {
    match format {
        OutputFormat::Json => {
            let stamped = Stamped {
                at: at.to_rfc3339(),
                notification,
            };
            serde_json::to_string(&stamped).unwrap_or_default()
        }
        OutputFormat::Text => {
            let line = match notification {
                Notification::Transition { from, to, event } => {
                    format!("{} -> {} ({})", from, to, event)
                }
                Notification::TimerArmed { effect, delay_ms } => {
                    format!("  {} timer armed: {}ms", effect, delay_ms)
                }
                Notification::ValidationStarted { candidate } => {
                    format!("  validating {}", candidate)
                }
                Notification::GenerationStarted { input_kind } => {
                    format!("  generating {}", input_kind)
                }
                Notification::StaleResultDropped { effect } => {
                    format!("  stale {} result dropped", effect)
                }
                Notification::TimerSuperseded { effect } => {
                    format!("  superseded {} timer ignored", effect)
                }
            };
            format!("{} {}", at.format("%H:%M:%S%.3f"), line)
        }
    }
}

pub fn render_snapshot(format: OutputFormat, snapshot: &Snapshot, at: DateTime<Local>) -> String {
    match format {
        OutputFormat::Json => {
            let record = json!({
                "type": "snapshot",
                "at": at.to_rfc3339(),
                "state": snapshot.state,
                "context": &snapshot.context,
            });
            record.to_string()
        }
        OutputFormat::Text => {
            let context = &snapshot.context;
            let mut out = String::new();

            let _ = writeln!(out, "state: {}", snapshot.state);
            let _ = writeln!(out, "input: {}/{}", context.input_kind, context.sub_kind);
            for (field, value) in &context.form_data {
                let _ = writeln!(out, "  {} = {}", field, value);
            }

            let validation = match &context.validation_result {
                None => "not checked".to_string(),
                Some(result) => {
                    let verdict = if context.input_valid_overridden {
                        "overridden"
                    } else if result.valid {
                        "valid"
                    } else {
                        "invalid"
                    };
                    match &result.detail {
                        Some(detail) => format!("{} ({})", verdict, detail),
                        None => verdict.to_string(),
                    }
                }
            };
            let _ = writeln!(out, "validation: {}", validation);

            let artifact = if context.artifact.is_some() { "yes" } else { "no" };
            let _ = writeln!(out, "artifact: {}", artifact);

            if let Some(error) = &context.last_error {
                let _ = writeln!(out, "error: {}", error);
            }

            out.trim_end().to_string()
        }
    }
}
