//! HTTP adapters for the rendering backend
//!
//! - `POST {base_url}/api/validate/check-url` with `{ "url": ... }`,
//!   answered by `{ "exists": bool, "title"?, "error"? }`
//! - `POST {base_url}/api/generate` with
//!   `{ "barcode_type", "data", "options" }`, answered by an arbitrary JSON
//!   body that becomes the artifact
//!
//! The generate endpoint strips option keys it does not know, so options
//! are sent under its names (`fgcolor`, `bgcolor`, `ecl`, ...). Style
//! fields it has no use for (gradient, shapes, logo, frame) are not sent;
//! backend-specific extras pass through unchanged.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::{AdapterResult, GenerationRequest, Generator, Validator};
use crate::config::BackendConfig;
use crate::error::AdapterError;
use crate::machine::{Artifact, Options, ValidationResult};

/// Detail reported when the backend says the site is down but gives no reason
const UNVERIFIED_DETAIL: &str = "The website could not be verified";

#[derive(Debug, Deserialize)]
struct CheckUrlResponse {
    exists: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl From<CheckUrlResponse> for ValidationResult {
    fn from(response: CheckUrlResponse) -> Self {
        if response.exists {
            ValidationResult {
                valid: true,
                detail: response.title,
            }
        } else {
            ValidationResult::invalid(
                response
                    .error
                    .unwrap_or_else(|| UNVERIFIED_DETAIL.to_string()),
            )
        }
    }
}

/// Validation adapter backed by the check-url endpoint
#[derive(Clone)]
pub struct HttpValidator {
    client: reqwest::Client,
    url: String,
}

impl HttpValidator {
    pub fn new(backend: &BackendConfig) -> Self {
        Self::with_client(reqwest::Client::new(), backend)
    }

    pub fn with_client(client: reqwest::Client, backend: &BackendConfig) -> Self {
        Self {
            client,
            url: backend.validate_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Validator for HttpValidator {
    async fn validate(&self, candidate: &str) -> AdapterResult<ValidationResult> {
        tracing::debug!(url = %self.url, candidate, "Checking URL");

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "url": candidate }))
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response).await?;
        let check: CheckUrlResponse =
            serde_json::from_value(body).map_err(|e| AdapterError::Decode(e.to_string()))?;

        Ok(check.into())
    }
}

/// Generation adapter backed by the generate endpoint
#[derive(Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(backend: &BackendConfig) -> Self {
        Self::with_client(reqwest::Client::new(), backend)
    }

    pub fn with_client(client: reqwest::Client, backend: &BackendConfig) -> Self {
        Self {
            client,
            url: backend.generate_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Wire body for the generate endpoint
fn generate_body(request: &GenerationRequest) -> Value {
    json!({
        "barcode_type": request.input_kind,
        "data": request.primary_data().unwrap_or_default(),
        "options": backend_options(&request.options),
    })
}

/// Rendering options under the generate endpoint's key names
fn backend_options(options: &Options) -> Value {
    let mut body = serde_json::Map::new();
    for (key, value) in &options.extra {
        body.insert(key.clone(), value.clone());
    }

    body.insert("size".to_string(), json!(options.size));
    body.insert("scale".to_string(), json!(options.scale));
    body.insert("margin".to_string(), json!(options.margin));
    body.insert("fgcolor".to_string(), json!(options.fg_color));
    body.insert("bgcolor".to_string(), json!(options.bg_color));
    body.insert("ecl".to_string(), json!(options.error_correction));

    Value::Object(body)
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Artifact> {
        tracing::debug!(url = %self.url, barcode_type = %request.input_kind, "Requesting render");

        let response = self
            .client
            .post(&self.url)
            .json(&generate_body(&request))
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response).await.map(Artifact::new)
    }
}

fn transport_error(error: reqwest::Error) -> AdapterError {
    AdapterError::Transport(error.to_string())
}

/// Decode a JSON body, turning non-2xx statuses into `Rejected`
async fn read_json(response: reqwest::Response) -> AdapterResult<Value> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    text.clone()
                }
            });

        return Err(AdapterError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| AdapterError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error body.
///
/// The backend uses `{ "error": { "message": .. } }`, `{ "error": ".." }`
/// and `{ "message": ".." }` depending on the route.
fn error_message(body: &Value) -> Option<String> {
    match body.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(Value::String(error)) => Some(error.clone()),
        _ => body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::context::ErrorCorrection;
    use crate::machine::{Context, InputKind};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned HTTP response, returning the raw request
    async fn serve_once(status: &str, body: &str) -> (BackendConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        let backend = BackendConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        (backend, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&buf).to_string()
    }

    fn request_body(raw: &str) -> Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_validator_reachable_site() {
        let (backend, server) =
            serve_once("200 OK", r#"{"exists":true,"title":"Example Domain"}"#).await;
        let validator = HttpValidator::new(&backend);

        let result = validator.validate("https://example.com").await.unwrap();
        assert!(result.valid);
        assert_eq!(result.detail.as_deref(), Some("Example Domain"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/validate/check-url "));
        assert_eq!(request_body(&raw), json!({ "url": "https://example.com" }));
    }

    #[tokio::test]
    async fn test_validator_unreachable_site() {
        let (backend, _server) =
            serve_once("200 OK", r#"{"exists":false,"error":"DNS lookup failed"}"#).await;
        let validator = HttpValidator::new(&backend);

        let result = validator.validate("https://nope.invalid").await.unwrap();
        assert_eq!(result, ValidationResult::invalid("DNS lookup failed"));
    }

    #[tokio::test]
    async fn test_validator_unreachable_without_reason() {
        let (backend, _server) = serve_once("200 OK", r#"{"exists":false}"#).await;
        let result = HttpValidator::new(&backend)
            .validate("https://nope.invalid")
            .await
            .unwrap();
        assert_eq!(result.detail.as_deref(), Some(UNVERIFIED_DETAIL));
    }

    #[tokio::test]
    async fn test_validator_rejected() {
        let (backend, _server) =
            serve_once("400 Bad Request", r#"{"error":"Invalid URL format"}"#).await;

        let error = HttpValidator::new(&backend)
            .validate("not a url")
            .await
            .unwrap_err();
        assert_eq!(
            error,
            AdapterError::Rejected {
                status: 400,
                message: "Invalid URL format".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_validator_undecodable_body() {
        let (backend, _server) = serve_once("200 OK", r#"{"reachable":true}"#).await;

        let error = HttpValidator::new(&backend)
            .validate("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(error, AdapterError::Decode(_)));
    }

    #[tokio::test]
    async fn test_validator_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = BackendConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        let error = HttpValidator::new(&backend)
            .validate("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(error, AdapterError::Transport(_)));
    }

    #[tokio::test]
    async fn test_generator_success() {
        let (backend, server) = serve_once("200 OK", r#"{"svgString":"<svg/>"}"#).await;
        let generator = HttpGenerator::new(&backend);

        let mut context = Context::fallback();
        context
            .form_data
            .insert("url".to_string(), "https://example.com".to_string());
        let artifact = generator
            .generate(GenerationRequest::from_context(&context))
            .await
            .unwrap();

        assert_eq!(artifact.as_value(), &json!({ "svgString": "<svg/>" }));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/generate "));
        let body = request_body(&raw);
        assert_eq!(body["barcode_type"], "qrcode");
        assert_eq!(body["data"], "https://example.com");
        assert_eq!(body["options"]["size"], 300);
        assert_eq!(body["options"]["ecl"], "M");
    }

    #[test]
    fn test_backend_options_use_endpoint_names() {
        let mut options = Options::default();
        options.fg_color = "#112233".to_string();
        options.error_correction = ErrorCorrection::H;
        options.extra.insert("includetext".to_string(), json!(true));

        let body = backend_options(&options);
        assert_eq!(body["fgcolor"], "#112233");
        assert_eq!(body["bgcolor"], "#FFFFFF");
        assert_eq!(body["ecl"], "H");
        assert_eq!(body["scale"], 2);
        assert_eq!(body["margin"], 4);
        assert_eq!(body["includetext"], true);
        assert!(body.get("fg_color").is_none());
        assert!(body.get("error_correction").is_none());
        assert!(body.get("gradient").is_none());
    }

    #[tokio::test]
    async fn test_generator_uses_data_field_for_linear_codes() {
        let (backend, server) = serve_once("200 OK", r#"{"svgString":"<svg/>"}"#).await;

        let mut context = Context::fallback();
        context.input_kind = InputKind::Code128;
        context.form_data.clear();
        context
            .form_data
            .insert("data".to_string(), "ABC-123".to_string());
        HttpGenerator::new(&backend)
            .generate(GenerationRequest::from_context(&context))
            .await
            .unwrap();

        let body = request_body(&server.await.unwrap());
        assert_eq!(body["barcode_type"], "code128");
        assert_eq!(body["data"], "ABC-123");
    }

    #[tokio::test]
    async fn test_generator_rejected_with_structured_error() {
        let (backend, _server) = serve_once(
            "422 Unprocessable Entity",
            r#"{"success":false,"error":{"message":"Invalid EAN-13 checksum","code":"INVALID_DATA"}}"#,
        )
        .await;

        let error = HttpGenerator::new(&backend)
            .generate(GenerationRequest::from_context(&Context::fallback()))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            AdapterError::Rejected {
                status: 422,
                message: "Invalid EAN-13 checksum".to_string()
            }
        );
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(&json!({ "error": { "message": "nested" } })).as_deref(),
            Some("nested")
        );
        assert_eq!(
            error_message(&json!({ "error": "flat" })).as_deref(),
            Some("flat")
        );
        assert_eq!(
            error_message(&json!({ "message": "top" })).as_deref(),
            Some("top")
        );
        assert_eq!(error_message(&json!({ "status": 500 })), None);
    }
}
