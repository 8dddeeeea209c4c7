//! Machine states and the state/context pair the reducer operates on

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::Context;

/// Finite set of orchestration states.
///
/// There is no terminal state: `Complete` and `Error` both accept input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    Typing,
    Validating,
    Ready,
    Generating,
    Complete,
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Typing => "typing",
            State::Validating => "validating",
            State::Ready => "ready",
            State::Generating => "generating",
            State::Complete => "complete",
            State::Error => "error",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus context, and the seed `Reset` returns to.
///
/// The seed is shared: cloning a machine never copies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub state: State,
    pub context: Context,
    seed: Arc<Context>,
}

impl Machine {
    /// Start in `Idle` with the given seeded context
    pub fn new(seed: Context) -> Self {
        Self {
            state: State::Idle,
            context: seed.clone(),
            seed: Arc::new(seed),
        }
    }

    pub fn seed(&self) -> &Context {
        &self.seed
    }

    /// Move to `state` with a context derived from the current one
    pub(crate) fn evolve(self, state: State, update: impl FnOnce(Context) -> Context) -> Self {
        Self {
            state,
            context: update(self.context),
            seed: self.seed,
        }
    }

    /// Move to `Idle` with a fresh copy of the seed
    pub(crate) fn reseed(self, update: impl FnOnce(Context) -> Context) -> Self {
        let context = update(Context::clone(&self.seed));
        Self {
            state: State::Idle,
            context,
            seed: self.seed,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            context: self.context.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        is_loading(self.state)
    }

    pub fn has_error(&self) -> bool {
        self.state == State::Error
    }

    pub fn can_generate(&self) -> bool {
        can_generate(self.state)
    }

    pub fn show_validation_feedback(&self) -> bool {
        self.context.validation_result.is_some()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Context::fallback())
    }
}

/// Read-only copy of the machine published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: State,
    pub context: Context,
}

impl Snapshot {
    /// Validation or generation is in flight
    pub fn is_loading(&self) -> bool {
        is_loading(self.state)
    }

    pub fn has_error(&self) -> bool {
        self.state == State::Error
    }

    /// A manual generate request would be accepted
    pub fn can_generate(&self) -> bool {
        can_generate(self.state)
    }

    pub fn show_validation_feedback(&self) -> bool {
        self.context.validation_result.is_some()
    }

    pub fn needs_validation(&self) -> bool {
        self.context.needs_validation()
    }
}

fn is_loading(state: State) -> bool {
    matches!(state, State::Validating | State::Generating)
}

fn can_generate(state: State) -> bool {
    matches!(state, State::Ready | State::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::context::ValidationResult;

    #[test]
    fn test_new_machine_is_idle() {
        let machine = Machine::default();
        assert_eq!(machine.state, State::Idle);
        assert_eq!(&machine.context, machine.seed());
        assert!(!machine.is_loading());
        assert!(!machine.has_error());
        assert!(!machine.can_generate());
        assert!(!machine.show_validation_feedback());
    }

    #[test]
    fn test_projections_per_state() {
        let all = [
            State::Idle,
            State::Typing,
            State::Validating,
            State::Ready,
            State::Generating,
            State::Complete,
            State::Error,
        ];

        for state in all {
            let snapshot = Snapshot {
                state,
                context: Context::fallback(),
            };
            assert_eq!(
                snapshot.is_loading(),
                state == State::Validating || state == State::Generating
            );
            assert_eq!(snapshot.has_error(), state == State::Error);
            assert_eq!(
                snapshot.can_generate(),
                state == State::Ready || state == State::Complete
            );
        }
    }

    #[test]
    fn test_show_validation_feedback() {
        let mut context = Context::fallback();
        context.validation_result = Some(ValidationResult::invalid("unreachable"));
        let snapshot = Snapshot {
            state: State::Ready,
            context,
        };
        assert!(snapshot.show_validation_feedback());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::Validating.to_string(), "validating");
        assert_eq!(State::Error.as_str(), "error");
    }
}
