//! Qrflow - generation orchestration for interactive QR and barcode editors
//!
//! Sits between an editing surface and two backend services. As the user
//! types, the orchestrator debounces keystrokes, checks URLs with a
//! validation service, and asks a rendering service for an artifact once
//! the input has settled, discarding any answer that arrives too late to
//! matter.
//!
//! - [`machine`]: pure state machine (context, events, reducer)
//! - `coordinator`: the task that owns timers and adapter calls
//! - [`Orchestrator`]: the facade applications talk to

pub mod adapters;
pub mod config;
mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod machine;
pub mod orchestrator;

// Re-export commonly used types
pub use config::Config;
pub use error::{AdapterError, ConfigError, QrflowError, Result};
pub use events::{EffectKind, Notification};
pub use machine::{Context, Event, InputKind, OptionsPatch, Snapshot, State, SubKind};
pub use orchestrator::Orchestrator;
