//! Mock adapters for testing
//!
//! Configurable stand-ins for the validation service, the rendering
//! backend and the defaults provider. They can simulate success, failure
//! and latency, and record every call so tests can assert on how often
//! (and with what) the coordinator reached out.
//!
//! Clones share their call records, so a test can keep one clone and hand
//! the other to the orchestrator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::sleep;

use crate::adapters::{AdapterResult, DefaultsProvider, GenerationRequest, Generator, Validator};
use crate::error::{AdapterError, ConfigError, Result};
use crate::machine::{Artifact, ContextDefaults, ValidationResult};

/// Mock validation service
#[derive(Debug, Clone)]
pub struct MockValidator {
    /// Verdict returned when the call succeeds
    pub outcome: ValidationResult,

    /// Error returned instead of the verdict
    pub error: Option<AdapterError>,

    /// Delay before answering (simulates network latency)
    pub delay: Duration,

    /// Candidates received, in call order
    pub candidates: Arc<Mutex<Vec<String>>>,
}

impl Default for MockValidator {
    fn default() -> Self {
        Self {
            outcome: ValidationResult::valid(),
            error: None,
            delay: Duration::from_millis(0),
            candidates: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockValidator {
    /// Every candidate is reachable
    pub fn valid() -> Self {
        Self::default()
    }

    /// Every candidate is judged unreachable
    pub fn invalid(detail: &str) -> Self {
        Self {
            outcome: ValidationResult::invalid(detail),
            ..Default::default()
        }
    }

    /// The service cannot be consulted
    pub fn failure(error: AdapterError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.candidates.lock().unwrap().len()
    }

    pub fn candidates(&self) -> Vec<String> {
        self.candidates.lock().unwrap().clone()
    }
}

#[async_trait]
impl Validator for MockValidator {
    async fn validate(&self, candidate: &str) -> AdapterResult<ValidationResult> {
        self.candidates.lock().unwrap().push(candidate.to_string());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.outcome.clone()),
        }
    }
}

/// Mock rendering backend
#[derive(Debug, Clone)]
pub struct MockGenerator {
    /// Error returned instead of an artifact
    pub error: Option<AdapterError>,

    /// Delay before answering (simulates rendering time)
    pub delay: Duration,

    /// Requests received, in call order
    pub requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            error: None,
            delay: Duration::from_millis(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockGenerator {
    /// Always renders successfully
    pub fn success() -> Self {
        Self::default()
    }

    /// Always fails with a backend rejection
    pub fn failure(message: &str) -> Self {
        Self {
            error: Some(AdapterError::Rejected {
                status: 500,
                message: message.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The artifact a successful call returns for `request`
    pub fn artifact_for(request: &GenerationRequest) -> Artifact {
        Artifact::new(json!({
            "barcode_type": request.input_kind,
            "data": request.primary_data(),
            "svg": format!("<svg width=\"{}\" height=\"{}\"/>", request.options.size, request.options.size),
        }))
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Artifact> {
        self.requests.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(Self::artifact_for(&request)),
        }
    }
}

/// Mock defaults provider
#[derive(Debug, Clone, Default)]
pub struct MockDefaults {
    /// `None` makes `load_defaults` fail
    pub defaults: Option<ContextDefaults>,
}

impl MockDefaults {
    pub fn with(defaults: ContextDefaults) -> Self {
        Self {
            defaults: Some(defaults),
        }
    }

    pub fn failing() -> Self {
        Self { defaults: None }
    }
}

#[async_trait]
impl DefaultsProvider for MockDefaults {
    async fn load_defaults(&self) -> Result<ContextDefaults> {
        self.defaults
            .clone()
            .ok_or_else(|| ConfigError::MissingField("defaults".to_string()).into())
    }
}
