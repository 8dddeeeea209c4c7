//! Notification bus for orchestrator observers
//!
//! The coordinator publishes a [`Notification`] for every transition and
//! every effect it starts or discards. Delivery uses
//! `tokio::sync::broadcast`, so any number of observers (the CLI, a UI,
//! tests) can listen without slowing the coordinator down.
//!
//! If nobody is subscribed, notifications are dropped immediately. A
//! lagging subscriber loses the oldest notifications rather than blocking
//! the emitter.
//!
//! # Example
//!
//! ```
//! use libqrflow::events::{EffectKind, EventBus, Notification};
//!
//! # async fn example() {
//! let bus = EventBus::new(64);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Notification::TimerArmed {
//!     effect: EffectKind::Debounce,
//!     delay_ms: 800,
//! });
//!
//! if let Ok(notification) = receiver.recv().await {
//!     println!("{:?}", notification);
//! }
//! # }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::machine::{InputKind, State};

/// Notification receiver type alias
pub type NotificationReceiver = broadcast::Receiver<Notification>;

/// Default per-subscriber buffer
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` notifications per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every notification emitted after this call
    pub fn subscribe(&self) -> NotificationReceiver {
        self.sender.subscribe()
    }

    /// Emit to all subscribers without blocking
    pub fn emit(&self, notification: Notification) {
        // Err only means nobody is listening
        let _ = self.sender.send(notification);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Timer and adapter-call categories managed by the coordinator.
///
/// At most one instance of each category is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Debounce,
    Validation,
    AutoGenerate,
    Generation,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Debounce => "debounce",
            EffectKind::Validation => "validation",
            EffectKind::AutoGenerate => "auto_generate",
            EffectKind::Generation => "generation",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The reducer moved the machine to a different state
    Transition {
        from: State,
        to: State,
        /// Name of the event that caused the move
        event: String,
    },

    /// A one-shot timer was (re)armed
    TimerArmed { effect: EffectKind, delay_ms: u64 },

    /// The validation adapter was called
    ValidationStarted { candidate: String },

    /// The generation adapter was called
    GenerationStarted { input_kind: InputKind },

    /// An adapter result arrived after its epoch ended
    StaleResultDropped { effect: EffectKind },

    /// A timer fired after it had been re-armed or cancelled
    TimerSuperseded { effect: EffectKind },
}
