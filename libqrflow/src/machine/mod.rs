//! Orchestration state machine
//!
//! - Context: what the orchestrator knows
//! - State: where in the edit/validate/generate cycle it is
//! - Event: what can happen
//! - Reducer: pure function (Machine, Event) -> Machine
//!
//! Nothing in this module performs I/O or touches a clock; see
//! the coordinator for the effect side.

pub mod context;
pub mod event;
pub mod reducer;
pub mod state;
pub mod wellformed;

pub use context::{
    Artifact, Context, ContextDefaults, FormData, InputKind, Options, OptionsPatch, SubKind,
    UiFlags, ValidationResult,
};
pub use event::Event;
pub use reducer::{qualifies_for_validation, reduce};
pub use state::{Machine, Snapshot, State};
pub use wellformed::is_well_formed_url;
