//! Effect coordinator
//!
//! The only stateful, side-effecting layer. A single tokio task owns the
//! [`Machine`], applies events to it one at a time through
//! [`reduce`](crate::machine::reduce), and after every event reconciles
//! the effects that belong to the resulting state:
//!
//! | State        | Effect                                             |
//! |--------------|----------------------------------------------------|
//! | `typing`     | debounce timer, fires `StoppedTyping`              |
//! | `validating` | validation call, answers `Validation*`             |
//! | `ready`      | auto-generate timer, fires `ForceGenerate`         |
//! | `generating` | generation call, answers `Generation*`             |
//!
//! Each category has one slot holding the key it was armed for. An effect
//! is (re)armed only when its key changes, and a slot never holds more than
//! one live timer. Leaving a state aborts that state's timer; adapter calls
//! are left to finish, but their results carry the epoch that spawned them
//! and are dropped once the machine has moved on.
//!
//! Timers and adapter tasks only hold a weak sender into the coordinator's
//! queue, so dropping the facade is enough to stop everything.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::adapters::{GenerationRequest, Generator, Validator};
use crate::config::TimingConfig;
use crate::error::AdapterError;
use crate::events::{EffectKind, EventBus, Notification};
use crate::machine::{reduce, Event, Machine, Snapshot, State};

/// Messages processed by the coordinator task, strictly in arrival order
#[derive(Debug)]
pub(crate) enum Message {
    /// User action from the facade
    Dispatch(Event),

    /// A one-shot timer expired
    TimerFired { effect: EffectKind, token: u64 },

    /// An adapter call finished, successfully or not
    Completed {
        effect: EffectKind,
        epoch: u64,
        event: Event,
    },

    /// Stop processing and tear down
    Shutdown,
}

pub(crate) type Outbox = mpsc::WeakUnboundedSender<Message>;

/// Published after every message so the facade can tell when its own
/// dispatches have been handled and nothing is left pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    /// Number of `Dispatch` messages processed so far
    pub handled: u64,
    /// No timer pending and no adapter call awaited
    pub idle: bool,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            handled: 0,
            idle: true,
        }
    }
}

/// One effect category's bookkeeping
struct Slot<K> {
    effect: EffectKind,
    /// Key the effect was last armed for; `None` when idle
    key: Option<K>,
    /// Token of the live timer, compared against fire messages
    token: u64,
    /// Live timer task, or the in-flight adapter call
    handle: Option<JoinHandle<()>>,
}

impl<K: PartialEq> Slot<K> {
    fn new(effect: EffectKind) -> Self {
        Self {
            effect,
            key: None,
            token: 0,
            handle: None,
        }
    }

    fn is_armed_for(&self, key: &K) -> bool {
        self.key.as_ref() == Some(key)
    }

    fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Abort the timer, if any, and forget the key
    fn cancel_timer(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(effect = %self.effect, token = self.token, "Timer cancelled");
            handle.abort();
        }
        self.key = None;
    }

    /// Forget an adapter call without aborting it.
    ///
    /// The request may already be on the wire; its result will be dropped
    /// by the epoch check.
    fn release_call(&mut self) -> Option<JoinHandle<()>> {
        self.key = None;
        let handle = self.handle.take();
        if handle.is_some() {
            debug!(effect = %self.effect, "Adapter call released");
        }
        handle
    }
}

pub(crate) struct Coordinator {
    timing: TimingConfig,
    validator: Arc<dyn Validator>,
    generator: Arc<dyn Generator>,
    bus: EventBus,
    snapshots: watch::Sender<Snapshot>,
    progress: watch::Sender<Progress>,
    outbox: Outbox,

    handled: u64,
    /// Incremented every time the state value changes
    epoch: u64,
    /// Incremented every time an event is accepted by the reducer
    revision: u64,
    next_token: u64,

    debounce: Slot<(u64, u64)>,
    validation: Slot<u64>,
    /// Keyed on the form, not the revision: option or intent changes
    /// while in `ready` leave a pending auto-generation alone
    auto_generate: Slot<(u64, String)>,
    generation: Slot<u64>,

    /// Released adapter calls still running; aborted on teardown
    orphans: Vec<JoinHandle<()>>,
}

impl Coordinator {
    pub(crate) fn new(
        timing: TimingConfig,
        validator: Arc<dyn Validator>,
        generator: Arc<dyn Generator>,
        bus: EventBus,
        snapshots: watch::Sender<Snapshot>,
        progress: watch::Sender<Progress>,
        outbox: Outbox,
    ) -> Self {
        Self {
            timing,
            validator,
            generator,
            bus,
            snapshots,
            progress,
            outbox,
            handled: 0,
            epoch: 0,
            revision: 0,
            next_token: 0,
            debounce: Slot::new(EffectKind::Debounce),
            validation: Slot::new(EffectKind::Validation),
            auto_generate: Slot::new(EffectKind::AutoGenerate),
            generation: Slot::new(EffectKind::Generation),
            orphans: Vec::new(),
        }
    }

    /// Process messages until shutdown or until every facade handle is gone
    pub(crate) async fn run(
        mut self,
        mut machine: Machine,
        mut inbox: mpsc::UnboundedReceiver<Message>,
    ) {
        debug!(state = %machine.state, "Coordinator started");

        while let Some(message) = inbox.recv().await {
            match message {
                Message::Dispatch(event) => {
                    machine = self.apply(machine, event);
                    self.handled += 1;
                    self.publish_progress();
                }
                Message::TimerFired { effect, token } => {
                    machine = self.on_timer(machine, effect, token);
                }
                Message::Completed {
                    effect,
                    epoch,
                    event,
                } => {
                    machine = self.on_completed(machine, effect, epoch, event);
                }
                Message::Shutdown => {
                    debug!("Shutdown requested");
                    break;
                }
            }
        }

        self.teardown();
        debug!(state = %machine.state, "Coordinator stopped");
    }

    /// Feed one event through the reducer and bring effects in line
    fn apply(&mut self, machine: Machine, event: Event) -> Machine {
        let from = machine.state;
        let name = event.name();
        let accepted_edit = matches!(event, Event::FormChanged { .. });
        let before = machine.clone();

        let machine = reduce(machine, event);

        let changed = machine != before;
        if !changed && !(accepted_edit && machine.state == State::Typing) {
            debug!(event = name, state = %from, "Event ignored");
            return machine;
        }

        self.revision += 1;
        if machine.state != from {
            self.epoch += 1;
            debug!(event = name, from = %from, to = %machine.state, epoch = self.epoch, "Transition");
            self.bus.emit(Notification::Transition {
                from,
                to: machine.state,
                event: name.to_string(),
            });
        }

        if changed {
            let snapshot = machine.snapshot();
            self.snapshots.send_replace(snapshot);
        }

        self.reconcile(&machine);
        machine
    }

    fn on_timer(&mut self, machine: Machine, effect: EffectKind, token: u64) -> Machine {
        let slot = match effect {
            EffectKind::Debounce => Some((&mut self.debounce.handle, self.debounce.token)),
            EffectKind::AutoGenerate => {
                Some((&mut self.auto_generate.handle, self.auto_generate.token))
            }
            EffectKind::Validation | EffectKind::Generation => None,
        };

        // A fire is honoured only if its timer is still the live one
        let fired = slot
            .filter(|(handle, slot_token)| handle.is_some() && *slot_token == token)
            .map(|(handle, _)| handle.take())
            .is_some();

        if !fired {
            debug!(effect = %effect, token, "Superseded timer fire dropped");
            self.bus.emit(Notification::TimerSuperseded { effect });
            return machine;
        }

        let event = match effect {
            EffectKind::Debounce => Event::StoppedTyping,
            _ => Event::ForceGenerate,
        };
        let machine = self.apply(machine, event);
        self.publish_progress();
        machine
    }

    fn on_completed(
        &mut self,
        machine: Machine,
        effect: EffectKind,
        epoch: u64,
        event: Event,
    ) -> Machine {
        let expected = if effect == EffectKind::Validation {
            State::Validating
        } else {
            State::Generating
        };

        if epoch != self.epoch || machine.state != expected {
            debug!(
                effect = %effect,
                result_epoch = epoch,
                current_epoch = self.epoch,
                state = %machine.state,
                "Stale adapter result dropped"
            );
            self.bus.emit(Notification::StaleResultDropped { effect });
            return machine;
        }

        // Finished; keep it out of the orphan list
        if effect == EffectKind::Validation {
            self.validation.handle = None;
        } else {
            self.generation.handle = None;
        }

        let machine = self.apply(machine, event);
        self.publish_progress();
        machine
    }

    /// Arm, keep or cancel each effect category for the current machine
    fn reconcile(&mut self, machine: &Machine) {
        let context = &machine.context;

        // Debounce: restarted by every accepted event while typing
        if machine.state == State::Typing {
            let key = (self.epoch, self.revision);
            if !self.debounce.is_armed_for(&key) {
                let delay = Duration::from_millis(context.debounce_interval_ms);
                self.debounce.cancel_timer();
                let (token, handle) = self.spawn_timer(EffectKind::Debounce, delay);
                self.debounce.key = Some(key);
                self.debounce.token = token;
                self.debounce.handle = Some(handle);
            }
        } else {
            self.debounce.cancel_timer();
        }

        // Validation: one call per entry into validating
        if machine.state == State::Validating {
            if !self.validation.is_armed_for(&self.epoch) {
                self.release(EffectKind::Validation);
                let handle = self.spawn_validation(context.candidate_input().to_string());
                self.validation.key = Some(self.epoch);
                self.validation.handle = Some(handle);
            }
        } else {
            self.release(EffectKind::Validation);
        }

        // Auto-generate: only for input that has not been rendered yet
        let wants_generation = machine.state == State::Ready
            && context.flags.auto_generate_enabled
            && (!context.has_generated_once || context.form_changed_since_generation());
        if wants_generation {
            let key = (self.epoch, context.form_snapshot());
            if !self.auto_generate.is_armed_for(&key) {
                let delay = if context.validation_result.is_some() {
                    self.timing.post_validation_delay()
                } else {
                    self.timing.auto_generation_delay()
                };
                self.auto_generate.cancel_timer();
                let (token, handle) = self.spawn_timer(EffectKind::AutoGenerate, delay);
                self.auto_generate.key = Some(key);
                self.auto_generate.token = token;
                self.auto_generate.handle = Some(handle);
            }
        } else {
            self.auto_generate.cancel_timer();
        }

        // Generation: one call per entry into generating
        if machine.state == State::Generating {
            if !self.generation.is_armed_for(&self.epoch) {
                self.release(EffectKind::Generation);
                let handle = self.spawn_generation(GenerationRequest::from_context(context));
                self.generation.key = Some(self.epoch);
                self.generation.handle = Some(handle);
            }
        } else {
            self.release(EffectKind::Generation);
        }

        self.publish_progress();
    }

    fn release(&mut self, effect: EffectKind) {
        let slot_handle = match effect {
            EffectKind::Validation => self.validation.release_call(),
            EffectKind::Generation => self.generation.release_call(),
            EffectKind::Debounce | EffectKind::AutoGenerate => None,
        };

        if let Some(handle) = slot_handle {
            if !handle.is_finished() {
                self.orphans.push(handle);
            }
        }
        self.orphans.retain(|handle| !handle.is_finished());
    }

    fn spawn_timer(&mut self, effect: EffectKind, delay: Duration) -> (u64, JoinHandle<()>) {
        self.next_token += 1;
        let token = self.next_token;
        let outbox = self.outbox.clone();

        debug!(effect = %effect, token, delay_ms = delay.as_millis() as u64, "Timer armed");
        self.bus.emit(Notification::TimerArmed {
            effect,
            delay_ms: delay.as_millis() as u64,
        });

        let handle = spawn_in_span(async move {
            tokio::time::sleep(delay).await;
            if let Some(sender) = outbox.upgrade() {
                let _ = sender.send(Message::TimerFired { effect, token });
            }
        });

        (token, handle)
    }

    fn spawn_validation(&self, candidate: String) -> JoinHandle<()> {
        let validator = Arc::clone(&self.validator);
        let timeout = self.timing.validation_timeout();
        let outbox = self.outbox.clone();
        let epoch = self.epoch;

        info!(candidate = %candidate, epoch, "Validating input");
        self.bus.emit(Notification::ValidationStarted {
            candidate: candidate.clone(),
        });

        spawn_in_span(async move {
            let outcome = with_timeout(timeout, validator.validate(&candidate)).await;
            let event = match outcome {
                Ok(result) => {
                    debug!(valid = result.valid, "Validation answered");
                    Event::ValidationSucceeded(result)
                }
                Err(error) => {
                    warn!(error = %error, "Validation failed");
                    Event::ValidationFailed {
                        detail: error.to_string(),
                    }
                }
            };

            if let Some(sender) = outbox.upgrade() {
                let _ = sender.send(Message::Completed {
                    effect: EffectKind::Validation,
                    epoch,
                    event,
                });
            }
        })
    }

    fn spawn_generation(&self, request: GenerationRequest) -> JoinHandle<()> {
        let generator = Arc::clone(&self.generator);
        let timeout = self.timing.generation_timeout();
        let outbox = self.outbox.clone();
        let epoch = self.epoch;

        info!(input_kind = %request.input_kind, epoch, "Generating artifact");
        self.bus.emit(Notification::GenerationStarted {
            input_kind: request.input_kind,
        });

        spawn_in_span(async move {
            let event = match with_timeout(timeout, generator.generate(request)).await {
                Ok(artifact) => Event::GenerationSucceeded(artifact),
                Err(error) => {
                    warn!(error = %error, "Generation failed");
                    Event::GenerationFailed {
                        error: error.to_string(),
                    }
                }
            };

            if let Some(sender) = outbox.upgrade() {
                let _ = sender.send(Message::Completed {
                    effect: EffectKind::Generation,
                    epoch,
                    event,
                });
            }
        })
    }

    /// True when no timer is pending and no adapter call is awaited
    fn is_idle(&self) -> bool {
        !(self.debounce.is_live()
            || self.validation.is_live()
            || self.auto_generate.is_live()
            || self.generation.is_live())
    }

    fn publish_progress(&self) {
        let progress = Progress {
            handled: self.handled,
            idle: self.is_idle(),
        };
        self.progress.send_if_modified(|current| {
            if *current != progress {
                *current = progress;
                true
            } else {
                false
            }
        });
    }

    /// Cancel every timer and abort every adapter call still running
    fn teardown(&mut self) {
        self.debounce.cancel_timer();
        self.auto_generate.cancel_timer();
        for effect in [EffectKind::Validation, EffectKind::Generation] {
            self.release(effect);
        }
        for handle in self.orphans.drain(..) {
            handle.abort();
        }
        self.publish_progress();
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, AdapterError>>,
) -> Result<T, AdapterError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(AdapterError::Timeout(timeout)))
}

fn spawn_in_span<F>(future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(future.instrument(tracing::Span::current()))
}
