//! Public facade
//!
//! [`Orchestrator`] is the only mutation surface. Every action method
//! produces exactly one event and queues it for the coordinator task;
//! reads go through the latest published [`Snapshot`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libqrflow::adapters::{MockGenerator, MockValidator};
//! use libqrflow::{Config, Orchestrator};
//!
//! # async fn example() -> libqrflow::Result<()> {
//! let orchestrator = Orchestrator::from_config(
//!     &Config::default_config(),
//!     Arc::new(MockValidator::valid()),
//!     Arc::new(MockGenerator::success()),
//! )
//! .await;
//!
//! orchestrator.update_form("url", "https://example.com")?;
//! orchestrator.settled().await;
//!
//! let snapshot = orchestrator.snapshot();
//! println!("{} (artifact: {})", snapshot.state, snapshot.context.artifact.is_some());
//!
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapters::{DefaultsProvider, Generator, Validator};
use crate::config::{Config, ConfigDefaults, TimingConfig};
use crate::coordinator::{Coordinator, Message, Progress};
use crate::error::{QrflowError, Result};
use crate::events::{EventBus, NotificationReceiver, DEFAULT_CAPACITY};
use crate::machine::{Context, Event, InputKind, Machine, OptionsPatch, Snapshot};

pub struct Orchestrator {
    session_id: Uuid,
    sender: mpsc::UnboundedSender<Message>,
    snapshots: watch::Receiver<Snapshot>,
    progress: watch::Receiver<Progress>,
    dispatched: AtomicU64,
    bus: EventBus,
    task: JoinHandle<()>,
}

impl Orchestrator {
    /// Start an orchestrator seeded from `config`, including its
    /// `[defaults]` section
    pub async fn from_config(
        config: &Config,
        validator: Arc<dyn Validator>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let provider = ConfigDefaults::from_config(config);
        Self::with_provider(config, &provider, validator, generator).await
    }

    /// Start an orchestrator whose seed comes from `provider`.
    ///
    /// The provider is consulted exactly once. If it fails the orchestrator
    /// still starts, from the hard-coded fallback context.
    pub async fn with_provider(
        config: &Config,
        provider: &dyn DefaultsProvider,
        validator: Arc<dyn Validator>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let seed = match provider.load_defaults().await {
            Ok(defaults) => Context::seeded(defaults),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load defaults, using fallback context");
                Context::fallback()
            }
        };

        let seed = seed
            .with_debounce_ms(config.timing.debounce_ms)
            .with_auto_generate(config.behavior.auto_generate);

        Self::spawn(seed, config.timing.clone(), validator, generator)
    }

    /// Start an orchestrator from an explicit seed context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        seed: Context,
        timing: TimingConfig,
        validator: Arc<dyn Validator>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let machine = Machine::new(seed);

        let (sender, inbox) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(machine.snapshot());
        let (progress_tx, progress) = watch::channel(Progress::default());
        let bus = EventBus::new(DEFAULT_CAPACITY);

        let coordinator = Coordinator::new(
            timing,
            validator,
            generator,
            bus.clone(),
            snapshot_tx,
            progress_tx,
            sender.downgrade(),
        );

        let span = tracing::info_span!("orchestrator", session = %session_id);
        let task = tokio::spawn(coordinator.run(machine, inbox).instrument(span));

        tracing::debug!(session = %session_id, "Orchestrator started");

        Self {
            session_id,
            sender,
            snapshots,
            progress,
            dispatched: AtomicU64::new(0),
            bus,
            task,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn dispatch(&self, event: Event) -> Result<()> {
        self.sender
            .send(Message::Dispatch(event))
            .map_err(|_| QrflowError::Closed)?;
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // === Actions ===

    /// Edit one form field
    pub fn update_form(&self, field: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.dispatch(Event::form(field, value))
    }

    /// Shallow-merge `patch` into the rendering options
    pub fn update_options(&self, patch: OptionsPatch) -> Result<()> {
        self.dispatch(Event::OptionsChanged(patch))
    }

    /// Switch artifact family; resets everything else to the seed
    pub fn change_type(&self, kind: InputKind) -> Result<()> {
        self.dispatch(Event::TypeChanged(kind))
    }

    pub fn generate_now(&self) -> Result<()> {
        self.dispatch(Event::ForceGenerate)
    }

    /// Generate despite a negative validation verdict (only from `ready`)
    pub fn generate_anyway(&self) -> Result<()> {
        self.dispatch(Event::OverrideAndGenerate)
    }

    pub fn reset(&self) -> Result<()> {
        self.dispatch(Event::Reset)
    }

    /// Report whether the user is mid-edit, optionally changing the
    /// debounce interval. A zero or absent interval keeps the current one.
    pub fn set_editing_intent(&self, is_editing: bool, debounce_ms: Option<u64>) -> Result<()> {
        self.dispatch(Event::EditingIntentChanged {
            is_editing,
            debounce_ms,
        })
    }

    // === Reads ===

    /// Latest published state and context
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified on every state or context change
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.bus.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshots.borrow().is_loading()
    }

    pub fn has_error(&self) -> bool {
        self.snapshots.borrow().has_error()
    }

    pub fn can_generate(&self) -> bool {
        self.snapshots.borrow().can_generate()
    }

    pub fn show_validation_feedback(&self) -> bool {
        self.snapshots.borrow().show_validation_feedback()
    }

    /// Whether every dispatched action has been handled and no timer or
    /// adapter call is pending
    pub fn is_settled(&self) -> bool {
        let target = self.dispatched.load(Ordering::SeqCst);
        let progress = *self.progress.borrow();
        progress.handled >= target && progress.idle
    }

    /// Wait until [`is_settled`](Self::is_settled) holds.
    ///
    /// Returns early if the coordinator has stopped.
    pub async fn settled(&self) {
        let target = self.dispatched.load(Ordering::SeqCst);
        let mut progress = self.progress.clone();
        // Err means the coordinator is gone, which is settled enough
        let _ = progress
            .wait_for(|progress| progress.handled >= target && progress.idle)
            .await;
    }

    /// Stop the coordinator, cancelling every timer and in-flight call
    pub async fn shutdown(self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Coordinator task ended abnormally");
        }
        tracing::debug!(session = %self.session_id, "Orchestrator shut down");
    }
}
