//! External collaborators consumed by the orchestrator
//!
//! The coordinator talks to the outside world only through these traits:
//!
//! - [`Validator`]: semantic check of the candidate input (does the URL
//!   respond?)
//! - [`Generator`]: renders an [`Artifact`] from the form and options
//! - [`DefaultsProvider`]: seeds the initial context, consulted once
//!
//! Implementations must fail rather than hang; the coordinator still wraps
//! every call in a timeout.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use libqrflow::adapters::{AdapterResult, Validator};
//! use libqrflow::machine::ValidationResult;
//!
//! struct AcceptEverything;
//!
//! #[async_trait]
//! impl Validator for AcceptEverything {
//!     async fn validate(&self, _candidate: &str) -> AdapterResult<ValidationResult> {
//!         Ok(ValidationResult::valid())
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AdapterError, Result};
use crate::machine::{
    Artifact, Context, ContextDefaults, FormData, InputKind, Options, ValidationResult,
};

pub mod http;
pub mod mock;

pub use http::{HttpGenerator, HttpValidator};
pub use mock::{MockDefaults, MockGenerator, MockValidator};

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

#[async_trait]
pub trait Validator: Send + Sync {
    /// Check `candidate` against the validation service.
    ///
    /// `Ok` with `valid == false` means the service answered and judged the
    /// input bad; `Err` means the service could not be consulted. Both end
    /// up in `ready`, but only the first carries the service's verdict.
    async fn validate(&self, candidate: &str) -> AdapterResult<ValidationResult>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Render an artifact. The returned value is stored verbatim.
    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Artifact>;
}

#[async_trait]
pub trait DefaultsProvider: Send + Sync {
    async fn load_defaults(&self) -> Result<ContextDefaults>;
}

/// Everything the generation adapter needs, copied out of the context at
/// the moment `generating` is entered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub input_kind: InputKind,
    pub payload: FormData,
    pub options: Options,
}

impl GenerationRequest {
    pub fn from_context(context: &Context) -> Self {
        Self {
            input_kind: context.input_kind,
            payload: context.form_data.clone(),
            options: context.options.clone(),
        }
    }

    /// The single data string a renderer encodes.
    ///
    /// Prefers `url`, then `text`, then `data`; empty fields are skipped.
    pub fn primary_data(&self) -> Option<&str> {
        ["url", "text", "data"]
            .iter()
            .filter_map(|key| self.payload.get(*key))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }
}
