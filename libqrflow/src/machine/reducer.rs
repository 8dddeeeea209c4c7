//! Pure transition function
//!
//! `(Machine, Event) -> Machine`
//!
//! The reducer has no side effects: no timers, no adapter calls, no
//! logging. Arming timers and calling adapters is the coordinator's job;
//! it observes the machine this function returns.
//!
//! Only the combinations matched below are defined. Every other
//! `(state, event)` pair returns the machine unchanged, which is how late
//! adapter results and out-of-place user actions are absorbed.

use super::context::{Context, ValidationResult};
use super::event::Event;
use super::state::{Machine, State};
use super::wellformed::is_well_formed_url;

pub fn reduce(machine: Machine, event: Event) -> Machine {
    use State::*;

    match (machine.state, event) {
        // === Any state ===
        (state, Event::EditingIntentChanged { is_editing, debounce_ms }) => {
            machine.evolve(state, |mut ctx| {
                ctx.flags.is_user_actively_editing = is_editing;
                if let Some(ms) = debounce_ms.filter(|ms| *ms > 0) {
                    ctx.debounce_interval_ms = ms;
                }
                ctx
            })
        }

        (_, Event::TypeChanged(kind)) => machine.reseed(|mut ctx| {
            ctx.input_kind = kind;
            ctx
        }),

        // === Idle ===
        (Idle, Event::FormChanged { field, value }) => {
            machine.evolve(Typing, |ctx| merge_field(ctx, field, value))
        }
        (Idle, Event::ForceGenerate) => machine.evolve(Generating, |ctx| ctx),

        // === Typing ===
        (Typing, Event::FormChanged { field, value }) => {
            machine.evolve(Typing, |ctx| merge_field(ctx, field, value))
        }
        (Typing, Event::StoppedTyping) => {
            if machine.context.flags.is_user_actively_editing {
                return machine;
            }
            let next = if qualifies_for_validation(&machine.context) {
                Validating
            } else {
                Ready
            };
            machine.evolve(next, |mut ctx| {
                ctx.flags.is_typing = false;
                ctx
            })
        }
        (Typing, Event::OptionsChanged(patch)) => machine.evolve(Ready, |mut ctx| {
            ctx.options = ctx.options.merged(patch);
            ctx.flags.is_typing = false;
            ctx
        }),

        // === Validating ===
        (Validating, Event::ValidationSucceeded(result)) => machine.evolve(Ready, |mut ctx| {
            ctx.is_input_valid = result.valid;
            ctx.input_valid_overridden = false;
            ctx.validation_result = Some(result);
            ctx.last_validated_input = ctx.candidate_input().to_string();
            ctx
        }),
        (Validating, Event::ValidationFailed { detail }) => machine.evolve(Ready, |mut ctx| {
            ctx.is_input_valid = false;
            ctx.input_valid_overridden = false;
            ctx.validation_result = Some(ValidationResult::invalid(detail));
            ctx.last_validated_input = ctx.candidate_input().to_string();
            ctx
        }),
        (Validating, Event::FormChanged { field, value }) => {
            machine.evolve(Typing, |ctx| merge_field(ctx, field, value))
        }

        // === Ready ===
        (Ready, Event::FormChanged { field, value }) => {
            machine.evolve(Typing, |ctx| merge_field(ctx, field, value))
        }
        (Ready, Event::ForceGenerate) => machine.evolve(Generating, |ctx| ctx),
        (Ready, Event::OverrideAndGenerate) => machine.evolve(Generating, |mut ctx| {
            ctx.is_input_valid = true;
            ctx.input_valid_overridden = true;
            ctx
        }),
        (Ready, Event::OptionsChanged(patch)) => machine.evolve(Ready, |mut ctx| {
            ctx.options = ctx.options.merged(patch);
            ctx
        }),

        // === Generating ===
        (Generating, Event::GenerationSucceeded(artifact)) => {
            machine.evolve(Complete, |mut ctx| {
                ctx.artifact = Some(artifact);
                ctx.last_generated_snapshot = ctx.form_snapshot();
                ctx.has_generated_once = true;
                ctx
            })
        }
        (Generating, Event::GenerationFailed { error }) => machine.evolve(Error, |mut ctx| {
            ctx.last_error = Some(error);
            ctx
        }),

        // === Complete ===
        (Complete, Event::FormChanged { field, value }) => {
            machine.evolve(Typing, |ctx| merge_field(ctx, field, value))
        }
        (Complete, Event::OptionsChanged(patch)) => machine.evolve(Ready, |mut ctx| {
            ctx.options = ctx.options.merged(patch);
            ctx
        }),
        (Complete, Event::Reset) | (Error, Event::Reset) => machine.reseed(|ctx| ctx),

        // === Error ===
        (Error, Event::FormChanged { field, value }) => machine.evolve(Typing, |ctx| {
            let mut ctx = merge_field(ctx, field, value);
            ctx.last_error = None;
            ctx
        }),

        // Undefined combination: ignored
        (_, _) => machine,
    }
}

/// Whether leaving `typing` should consult the validation adapter.
///
/// The input must belong to a validated variant, be non-empty, differ from
/// what was last validated and pass the local syntax check.
pub fn qualifies_for_validation(context: &Context) -> bool {
    if !context.needs_validation() {
        return false;
    }

    let candidate = context.candidate_input();
    !candidate.is_empty()
        && candidate != context.last_validated_input
        && is_well_formed_url(candidate)
}

fn merge_field(mut ctx: Context, field: String, value: String) -> Context {
    ctx.form_data.insert(field, value);
    ctx.flags.is_typing = true;
    ctx.flags.has_started_typing = true;

    // A form change ends any validity override
    if ctx.input_valid_overridden {
        ctx.input_valid_overridden = false;
        ctx.is_input_valid = ctx.validation_result.as_ref().map_or(false, |r| r.valid);
    }

    ctx
}
