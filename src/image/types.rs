//! Core types for image generation.

use crate::error::{ImageGenerationError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI image models (DALL-E, GPT Image).
    OpenAi,
    /// Google Imagen models served through the Gemini API.
    Imagen,
    /// xAI Grok image models.
    Xai,
    /// Deterministic offline stub.
    Mock,
}

impl ProviderKind {
    /// Parses a provider identifier, accepting known aliases.
    ///
    /// Input is trimmed and lowercased first. Returns `None` for unknown ids;
    /// see [`ProviderKind::resolve`] for the never-failing variant.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "openai" | "open-ai" | "dall-e" | "dalle" => Some(Self::OpenAi),
            "imagen" | "gemini" | "google" | "google-imagen" | "imagen3" => Some(Self::Imagen),
            "xai" | "x-ai" | "grok" => Some(Self::Xai),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    /// Total mapping from identifier to provider; unknown ids fall back to
    /// OpenAI.
    pub fn resolve(id: &str) -> Self {
        Self::from_id(id).unwrap_or(Self::OpenAi)
    }

    /// Canonical identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Imagen => "imagen",
            Self::Xai => "xai",
            Self::Mock => "mock",
        }
    }

    /// Display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI (DALL-E / GPT Image)",
            Self::Imagen => "Imagen (Google Gemini API)",
            Self::Xai => "Grok (xAI)",
            Self::Mock => "Mock (offline)",
        }
    }

    /// Environment variables consulted for the key, in order.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Imagen => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Self::Xai => &["XAI_API_KEY"],
            Self::Mock => &[],
        }
    }

    /// Whether the upstream transport rejects non-ASCII prompt bytes.
    pub fn requires_ascii_prompt(&self) -> bool {
        matches!(self, Self::Xai)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common aspect ratios for image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 standard landscape aspect ratio.
    #[serde(rename = "4:3")]
    Standard,
    /// 3:4 standard portrait aspect ratio.
    #[serde(rename = "3:4")]
    StandardPortrait,
    /// 21:9 ultrawide aspect ratio.
    #[serde(rename = "21:9")]
    Ultrawide,
}

impl AspectRatio {
    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
            Self::Ultrawide => "21:9",
        }
    }

    fn ratio(&self) -> f64 {
        match self {
            Self::Square => 1.0,
            Self::Landscape => 16.0 / 9.0,
            Self::Portrait => 9.0 / 16.0,
            Self::Standard => 4.0 / 3.0,
            Self::StandardPortrait => 3.0 / 4.0,
            Self::Ultrawide => 21.0 / 9.0,
        }
    }

    /// Picks the candidate closest to a `width x height` frame.
    pub fn nearest(width: u32, height: u32, candidates: &[AspectRatio]) -> Option<AspectRatio> {
        if width == 0 || height == 0 {
            return None;
        }
        let target = (width as f64 / height as f64).ln();
        candidates.iter().copied().min_by(|a, b| {
            let da = (a.ratio().ln() - target).abs();
            let db = (b.ratio().ln() - target).abs();
            da.total_cmp(&db)
        })
    }
}

impl FromStr for AspectRatio {
    type Err = ImageGenerationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1:1" => Ok(Self::Square),
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            "4:3" => Ok(Self::Standard),
            "3:4" => Ok(Self::StandardPortrait),
            "21:9" => Ok(Self::Ultrawide),
            other => Err(ImageGenerationError::invalid_prompt(format!(
                "unsupported aspect ratio: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a `WxH` size string.
pub(crate) fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// How generated images should be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain HTTP(S) URLs hosted by the provider.
    #[default]
    Url,
    /// `data:` URIs carrying the base64 payload.
    Base64,
}

/// Caller-supplied generation options.
///
/// No field is required. Adapters drop fields their endpoint does not
/// accept instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageGenerationOptions {
    /// Requested image count; clamped per provider.
    pub count: Option<u32>,
    /// Size as `WxH`.
    pub size: Option<String>,
    /// Aspect ratio such as `16:9`.
    pub aspect_ratio: Option<String>,
    /// Provider-specific quality tier.
    pub quality: Option<String>,
    /// Provider-specific style.
    pub style: Option<String>,
    /// Provider-specific model identifier.
    pub model: Option<String>,
    /// Requested return format.
    pub response_format: Option<ResponseFormat>,
    /// Shorthand for `response_format = Base64`.
    pub return_base64: bool,
    /// Opaque passthrough; only keys on a provider's allow-list are sent.
    pub additional_params: Map<String, Value>,
}

impl ImageGenerationOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the requested image count.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the size (`WxH`).
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    /// Sets the quality.
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Sets the style.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the response format.
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Adds a passthrough parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_params.insert(key.into(), value.into());
        self
    }

    /// The effective response format.
    pub fn resolved_response_format(&self) -> ResponseFormat {
        if self.return_base64 {
            ResponseFormat::Base64
        } else {
            self.response_format.unwrap_or_default()
        }
    }

    /// The requested model, ignoring blank values.
    pub(crate) fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default)
    }

    /// Requested count clamped to `1..=max`.
    pub(crate) fn clamped_count(&self, max: u32) -> u32 {
        self.count.unwrap_or(1).clamp(1, max.max(1))
    }

    /// Non-blank value of an optional string option.
    pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    /// Resolved model id (possibly defaulted).
    pub model: String,
    /// Original, pre-sanitization prompt.
    pub prompt: String,
    /// Provider that served the call.
    pub provider: Option<ProviderKind>,
    /// Prompts as rewritten by the provider, when reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revised_prompts: Vec<String>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u64,
}

/// Successful generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "generated images should be persisted or displayed"]
pub struct ImageGenerationResult {
    /// Ordered image locations: HTTP(S) URLs or `data:` URIs.
    pub image_urls: Vec<String>,
    /// Provider payload, for diagnostics only.
    pub raw_response: Value,
    /// Call metadata.
    pub metadata: GenerationMetadata,
}

/// Outcome of a key check. Never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyValidationResult {
    /// Whether the provider accepted the key.
    pub is_valid: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Provider-specific details (model list, advisory flags).
    pub details: Value,
}

impl ApiKeyValidationResult {
    /// A successful check.
    pub fn valid(message: impl Into<String>, details: Value) -> Self {
        Self {
            is_valid: true,
            message: message.into(),
            details,
        }
    }

    /// A failed check.
    pub fn invalid(message: impl Into<String>, details: Value) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
            details,
        }
    }
}

/// Wraps a base64 payload into a `data:` URI.
pub fn to_data_uri(mime_type: &str, b64: &str) -> String {
    format!("data:{mime_type};base64,{b64}")
}

/// Splits a base64 `data:` URI into MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageGenerationError::malformed_response("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageGenerationError::malformed_response("data URI has no payload"))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| ImageGenerationError::malformed_response("data URI is not base64"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ImageGenerationError::malformed_response(format!("invalid base64: {e}")))?;
    Ok((mime_type.to_string(), bytes))
}

/// File extension for an image MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_aliases() {
        assert_eq!(ProviderKind::from_id("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_id(" gemini "), Some(ProviderKind::Imagen));
        assert_eq!(ProviderKind::from_id("google-imagen"), Some(ProviderKind::Imagen));
        assert_eq!(ProviderKind::from_id("GROK"), Some(ProviderKind::Xai));
        assert_eq!(ProviderKind::from_id("xai"), Some(ProviderKind::Xai));
        assert_eq!(ProviderKind::from_id("midjourney"), None);
    }

    #[test]
    fn test_provider_resolve_defaults_to_openai() {
        assert_eq!(ProviderKind::resolve(""), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::resolve("totally-unknown"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::resolve("imagen"), ProviderKind::Imagen);
    }

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Landscape);
        assert!("5:7".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_nearest_aspect_ratio() {
        let all = [
            AspectRatio::Square,
            AspectRatio::Landscape,
            AspectRatio::Portrait,
            AspectRatio::Standard,
            AspectRatio::StandardPortrait,
        ];
        assert_eq!(AspectRatio::nearest(1024, 1024, &all), Some(AspectRatio::Square));
        assert_eq!(AspectRatio::nearest(1792, 1024, &all), Some(AspectRatio::Landscape));
        assert_eq!(AspectRatio::nearest(768, 1024, &all), Some(AspectRatio::StandardPortrait));
        assert_eq!(AspectRatio::nearest(0, 1024, &all), None);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024x768"), Some((1024, 768)));
        assert_eq!(parse_size(" 512X512 "), Some((512, 512)));
        assert_eq!(parse_size("big"), None);
    }

    #[test]
    fn test_response_format_resolution() {
        let opts = ImageGenerationOptions::new();
        assert_eq!(opts.resolved_response_format(), ResponseFormat::Url);

        let opts = ImageGenerationOptions {
            return_base64: true,
            response_format: Some(ResponseFormat::Url),
            ..Default::default()
        };
        assert_eq!(opts.resolved_response_format(), ResponseFormat::Base64);
    }

    #[test]
    fn test_clamped_count() {
        assert_eq!(ImageGenerationOptions::new().clamped_count(4), 1);
        assert_eq!(ImageGenerationOptions::new().with_count(0).clamped_count(4), 1);
        assert_eq!(ImageGenerationOptions::new().with_count(9).clamped_count(4), 4);
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let json = r#"{"count": 2, "aspectRatio": "1:1", "returnBase64": true, "additionalParams": {"seed": 7}}"#;
        let opts: ImageGenerationOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.count, Some(2));
        assert_eq!(opts.aspect_ratio.as_deref(), Some("1:1"));
        assert!(opts.return_base64);
        assert_eq!(opts.additional_params.get("seed"), Some(&Value::from(7)));
    }

    #[test]
    fn test_decode_data_uri() {
        let uri = to_data_uri("image/png", "AQID");
        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![1, 2, 3]);

        assert!(decode_data_uri("https://example.com/a.png").is_err());
        assert!(decode_data_uri("data:image/png,AQID").is_err());
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
    }
}
