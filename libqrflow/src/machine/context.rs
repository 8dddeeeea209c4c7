//! Context store
//!
//! Plain data describing everything the orchestrator knows about the
//! current editing session: form input, rendering options, validation and
//! generation results, and UI flags. The context has no behaviour of its
//! own beyond small derivations; it is only ever replaced by the reducer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_DEBOUNCE_MS;

/// Form field holding the input that is checked by the validation adapter.
pub const URL_FIELD: &str = "url";

/// Placeholder shown in a fresh form. Never considered well-formed.
pub const PLACEHOLDER_URL: &str = "https://your-site.com";

/// Raw, unvalidated user input keyed by field name.
///
/// Ordered so that snapshots of the same data always serialize identically.
pub type FormData = BTreeMap<String, String>;

/// Artifact family being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Qrcode,
    Code128,
    Code39,
    Code93,
    Ean13,
    Ean8,
    Upca,
    Upce,
    Itf,
    Codabar,
    Pdf417,
    Datamatrix,
    Aztec,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Qrcode => "qrcode",
            InputKind::Code128 => "code128",
            InputKind::Code39 => "code39",
            InputKind::Code93 => "code93",
            InputKind::Ean13 => "ean13",
            InputKind::Ean8 => "ean8",
            InputKind::Upca => "upca",
            InputKind::Upce => "upce",
            InputKind::Itf => "itf",
            InputKind::Codabar => "codabar",
            InputKind::Pdf417 => "pdf417",
            InputKind::Datamatrix => "datamatrix",
            InputKind::Aztec => "aztec",
        }
    }
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qrcode" | "qr" => Ok(InputKind::Qrcode),
            "code128" => Ok(InputKind::Code128),
            "code39" => Ok(InputKind::Code39),
            "code93" => Ok(InputKind::Code93),
            "ean13" => Ok(InputKind::Ean13),
            "ean8" => Ok(InputKind::Ean8),
            "upca" => Ok(InputKind::Upca),
            "upce" => Ok(InputKind::Upce),
            "itf" => Ok(InputKind::Itf),
            "codabar" => Ok(InputKind::Codabar),
            "pdf417" => Ok(InputKind::Pdf417),
            "datamatrix" => Ok(InputKind::Datamatrix),
            "aztec" => Ok(InputKind::Aztec),
            _ => Err(format!("Unknown input kind: '{}'", s)),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disambiguates the content of a QR code. Ignored for linear barcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubKind {
    Link,
    Text,
    Email,
    Phone,
    Sms,
    Wifi,
    Vcard,
}

impl SubKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubKind::Link => "link",
            SubKind::Text => "text",
            SubKind::Email => "email",
            SubKind::Phone => "phone",
            SubKind::Sms => "sms",
            SubKind::Wifi => "wifi",
            SubKind::Vcard => "vcard",
        }
    }
}

impl fmt::Display for SubKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "link" | "url" => Ok(SubKind::Link),
            "text" => Ok(SubKind::Text),
            "email" => Ok(SubKind::Email),
            "phone" => Ok(SubKind::Phone),
            "sms" => Ok(SubKind::Sms),
            "wifi" => Ok(SubKind::Wifi),
            "vcard" => Ok(SubKind::Vcard),
            _ => Err(format!("Unknown sub kind: '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKind {
    Linear,
    Radial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub enabled: bool,
    pub kind: GradientKind,
    pub colors: Vec<String>,
    /// Angle in degrees, linear gradients only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeShape {
    Square,
    Rounded,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataShape {
    Square,
    Dots,
    Rounded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logo {
    /// Base64 image payload
    pub data: String,
    pub size_percentage: u8,
    #[serde(default)]
    pub padding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Simple,
    Rounded,
    Decorated,
    Bubble,
    Speech,
    Badge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub text: String,
    pub text_position: TextPosition,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Rendering configuration handed verbatim to the generation adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub size: u32,
    pub scale: u32,
    pub margin: u32,
    pub error_correction: ErrorCorrection,
    pub fg_color: String,
    pub bg_color: String,
    pub gradient: Option<Gradient>,
    pub eye_shape: Option<EyeShape>,
    pub data_shape: Option<DataShape>,
    pub logo: Option<Logo>,
    pub frame: Option<Frame>,
    /// Backend-specific options this crate does not model
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            size: 300,
            scale: 2,
            margin: 4,
            error_correction: ErrorCorrection::M,
            fg_color: "#000000".to_string(),
            bg_color: "#FFFFFF".to_string(),
            gradient: Some(Gradient {
                enabled: true,
                kind: GradientKind::Radial,
                colors: vec!["#000000".to_string(), "#666666".to_string()],
                angle: None,
            }),
            eye_shape: Some(EyeShape::Rounded),
            data_shape: Some(DataShape::Square),
            logo: None,
            frame: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Partial update of [`Options`].
///
/// Merging is shallow: every field that is `Some` replaces the whole
/// top-level value, nested records included. A patched gradient carries
/// its full colour list; nothing from the previous gradient survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    pub size: Option<u32>,
    pub scale: Option<u32>,
    pub margin: Option<u32>,
    pub error_correction: Option<ErrorCorrection>,
    pub fg_color: Option<String>,
    pub bg_color: Option<String>,
    pub gradient: Option<Gradient>,
    pub eye_shape: Option<EyeShape>,
    pub data_shape: Option<DataShape>,
    pub logo: Option<Logo>,
    pub frame: Option<Frame>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OptionsPatch {
    pub fn is_empty(&self) -> bool {
        *self == OptionsPatch::default()
    }
}

impl Options {
    /// Apply a patch, returning the merged options
    pub fn merged(self, patch: OptionsPatch) -> Options {
        let mut extra = self.extra;
        extra.extend(patch.extra);

        Options {
            size: patch.size.unwrap_or(self.size),
            scale: patch.scale.unwrap_or(self.scale),
            margin: patch.margin.unwrap_or(self.margin),
            error_correction: patch.error_correction.unwrap_or(self.error_correction),
            fg_color: patch.fg_color.unwrap_or(self.fg_color),
            bg_color: patch.bg_color.unwrap_or(self.bg_color),
            gradient: patch.gradient.or(self.gradient),
            eye_shape: patch.eye_shape.or(self.eye_shape),
            data_shape: patch.data_shape.or(self.data_shape),
            logo: patch.logo.or(self.logo),
            frame: patch.frame.or(self.frame),
            extra,
        }
    }
}

/// Outcome reported by the validation adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { valid: true, detail: None }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            detail: Some(detail.into()),
        }
    }
}

/// Output of the generation adapter, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(Value);

impl Artifact {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Artifact {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiFlags {
    pub is_typing: bool,
    pub has_started_typing: bool,
    pub auto_generate_enabled: bool,
    pub is_user_actively_editing: bool,
}

impl Default for UiFlags {
    fn default() -> Self {
        Self {
            is_typing: false,
            has_started_typing: false,
            auto_generate_enabled: true,
            is_user_actively_editing: false,
        }
    }
}

/// Seed values read once from a defaults provider.
///
/// Only the input kinds, form fields and options can be seeded; the rest of
/// the context always starts from the hard-coded fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextDefaults {
    pub input_kind: Option<InputKind>,
    pub sub_kind: Option<SubKind>,
    pub form: FormData,
    pub options: Option<OptionsPatch>,
}

/// The full orchestration context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub input_kind: InputKind,
    pub sub_kind: SubKind,
    pub form_data: FormData,
    pub options: Options,

    /// Input the validation adapter was last run against
    pub last_validated_input: String,
    pub validation_result: Option<ValidationResult>,
    pub is_input_valid: bool,
    /// Set by an explicit override; cleared by the next form change
    pub input_valid_overridden: bool,

    pub artifact: Option<Artifact>,
    /// Serialized `form_data` as of the last successful generation
    pub last_generated_snapshot: String,
    pub has_generated_once: bool,

    pub flags: UiFlags,
    pub debounce_interval_ms: u64,

    /// Present only while the machine is in `error`
    pub last_error: Option<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::fallback()
    }
}

impl Context {
    /// Hard-coded context used when no defaults provider is available
    pub fn fallback() -> Self {
        let mut form_data = FormData::new();
        form_data.insert(URL_FIELD.to_string(), PLACEHOLDER_URL.to_string());

        Self {
            input_kind: InputKind::Qrcode,
            sub_kind: SubKind::Link,
            form_data,
            options: Options::default(),
            last_validated_input: String::new(),
            validation_result: None,
            is_input_valid: false,
            input_valid_overridden: false,
            artifact: None,
            last_generated_snapshot: String::new(),
            has_generated_once: false,
            flags: UiFlags::default(),
            debounce_interval_ms: DEFAULT_DEBOUNCE_MS,
            last_error: None,
        }
    }

    /// Fallback context with provider defaults layered on top
    pub fn seeded(defaults: ContextDefaults) -> Self {
        let mut context = Self::fallback();

        if let Some(kind) = defaults.input_kind {
            context.input_kind = kind;
        }
        if let Some(sub_kind) = defaults.sub_kind {
            context.sub_kind = sub_kind;
        }
        context.form_data.extend(defaults.form);
        if let Some(patch) = defaults.options {
            context.options = context.options.merged(patch);
        }

        context
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_interval_ms = debounce_ms;
        self
    }

    pub fn with_auto_generate(mut self, enabled: bool) -> Self {
        self.flags.auto_generate_enabled = enabled;
        self
    }

    /// Whether the current kinds route input through the validation adapter
    pub fn needs_validation(&self) -> bool {
        self.input_kind == InputKind::Qrcode && self.sub_kind == SubKind::Link
    }

    /// The input that would be sent to the validation adapter
    pub fn candidate_input(&self) -> &str {
        self.form_data.get(URL_FIELD).map(String::as_str).unwrap_or("")
    }

    /// Serialized copy of `form_data` used for change detection
    pub fn form_snapshot(&self) -> String {
        serde_json::to_string(&self.form_data).unwrap_or_default()
    }

    /// True when the form differs from what was last generated
    pub fn form_changed_since_generation(&self) -> bool {
        self.form_snapshot() != self.last_generated_snapshot
    }
}
