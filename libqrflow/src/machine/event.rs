//! Events fed to the reducer
//!
//! User actions from the facade and outcomes of timers and adapter calls
//! all arrive as one of these variants.

use super::context::{Artifact, InputKind, OptionsPatch, ValidationResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // === User input ===
    /// A single form field was edited
    FormChanged { field: String, value: String },

    /// Shallow update of the rendering options
    OptionsChanged(OptionsPatch),

    /// Switch artifact family; always resets the context
    TypeChanged(InputKind),

    /// Generate immediately, skipping the automatic pipeline
    ForceGenerate,

    /// Generate even though validation said the input is invalid
    OverrideAndGenerate,

    Reset,

    /// Typing-intent hint from the editor
    EditingIntentChanged {
        is_editing: bool,
        debounce_ms: Option<u64>,
    },

    // === Timers ===
    /// The typing debounce window expired
    StoppedTyping,

    // === Adapter outcomes ===
    ValidationSucceeded(ValidationResult),
    ValidationFailed { detail: String },
    GenerationSucceeded(Artifact),
    GenerationFailed { error: String },
}

impl Event {
    /// Stable name used in logs and notifications
    pub fn name(&self) -> &'static str {
        match self {
            Event::FormChanged { .. } => "form_changed",
            Event::OptionsChanged(_) => "options_changed",
            Event::TypeChanged(_) => "type_changed",
            Event::ForceGenerate => "force_generate",
            Event::OverrideAndGenerate => "override_and_generate",
            Event::Reset => "reset",
            Event::EditingIntentChanged { .. } => "editing_intent_changed",
            Event::StoppedTyping => "stopped_typing",
            Event::ValidationSucceeded(_) => "validation_succeeded",
            Event::ValidationFailed { .. } => "validation_failed",
            Event::GenerationSucceeded(_) => "generation_succeeded",
            Event::GenerationFailed { .. } => "generation_failed",
        }
    }

    pub fn form(field: impl Into<String>, value: impl Into<String>) -> Self {
        Event::FormChanged {
            field: field.into(),
            value: value.into(),
        }
    }
}
