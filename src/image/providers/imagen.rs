//! Imagen (Google) image generation adapter.
//!
//! Talks to the Gemini API's OpenAI-style image endpoint. The key is sent
//! both as a bearer token and in `x-goog-api-key`.

use crate::config::{AdapterConfig, RetryPolicy};
use crate::error::{ErrorKind, ImageGenerationError, Result};
use crate::image::classify::UpstreamFailure;
use crate::image::provider::ProviderAdapter;
use crate::image::providers::http::{self, Extracted};
use crate::image::retry::run_with_retries;
use crate::image::sanitize::prepare_prompt;
use crate::image::types::{
    parse_size, to_data_uri, ApiKeyValidationResult, AspectRatio, ImageGenerationOptions,
    ImageGenerationResult, ProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_IMAGES: u32 = 4;

/// Aspect ratios Imagen accepts.
const SUPPORTED_RATIOS: [AspectRatio; 5] = [
    AspectRatio::Square,
    AspectRatio::Landscape,
    AspectRatio::Portrait,
    AspectRatio::Standard,
    AspectRatio::StandardPortrait,
];

/// Passthrough parameters Imagen accepts.
const PASSTHROUGH_PARAMS: &[&str] = &["person_generation", "negative_prompt", "seed"];

/// Imagen model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImagenModel {
    /// Imagen 3.
    #[default]
    Imagen3,
    /// Imagen 4 standard.
    Imagen4,
    /// Imagen 4 fast (cheaper, lower latency).
    Imagen4Fast,
    /// Imagen 4 ultra (one image per call).
    Imagen4Ultra,
}

impl ImagenModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imagen3 => "imagen-3.0-generate-002",
            Self::Imagen4 => "imagen-4.0-generate-001",
            Self::Imagen4Fast => "imagen-4.0-fast-generate-001",
            Self::Imagen4Ultra => "imagen-4.0-ultra-generate-001",
        }
    }

    fn max_images_for(model: &str) -> u32 {
        if model.contains("ultra") {
            1
        } else {
            MAX_IMAGES
        }
    }
}

/// Builder for ImagenAdapter.
#[derive(Debug, Clone, Default)]
pub struct ImagenAdapterBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: ImagenModel,
    retry: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl ImagenAdapterBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the Imagen model variant.
    pub fn model(mut self, model: ImagenModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the adapter, resolving the API key.
    pub fn build(self) -> Result<ImagenAdapter> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .ok_or_else(|| {
                ImageGenerationError::new(
                    ErrorKind::Authentication,
                    "GEMINI_API_KEY / GOOGLE_API_KEY not set and no API key provided",
                )
            })?;

        let mut config = AdapterConfig::new(api_key)
            .with_base_url(self.base_url)
            .with_retry(self.retry);
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(timeout);
        }
        Ok(ImagenAdapter::new(&config).with_default_model(self.model))
    }
}

/// Imagen image generation adapter.
#[derive(Debug, Clone)]
pub struct ImagenAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: ImagenModel,
    retry: RetryPolicy,
}

impl ImagenAdapter {
    /// Creates a new `ImagenAdapterBuilder`.
    pub fn builder() -> ImagenAdapterBuilder {
        ImagenAdapterBuilder::new()
    }

    /// Creates an adapter from explicit settings. Never fails.
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            client: config.http_client(),
            api_key: config.api_key.clone(),
            base_url: config.resolve_base_url(DEFAULT_BASE_URL),
            default_model: ImagenModel::default(),
            retry: config.retry,
        }
    }

    fn with_default_model(mut self, model: ImagenModel) -> Self {
        self.default_model = model;
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        request.bearer_auth(api_key).header(API_KEY_HEADER, api_key)
    }

    fn resolve_aspect_ratio(options: &ImageGenerationOptions) -> Option<AspectRatio> {
        if let Some(raw) = ImageGenerationOptions::non_blank(&options.aspect_ratio) {
            return match raw.parse::<AspectRatio>() {
                Ok(ratio) if SUPPORTED_RATIOS.contains(&ratio) => Some(ratio),
                _ => {
                    tracing::debug!(aspect_ratio = %raw, "dropping aspect ratio Imagen does not support");
                    None
                }
            };
        }
        let (w, h) = parse_size(options.size.as_deref()?)?;
        AspectRatio::nearest(w, h, &SUPPORTED_RATIOS)
    }

    fn parse_error(status: u16, text: &str) -> ImageGenerationError {
        let body = http::error_body(text);
        let error = body.as_ref().and_then(|b| b.get("error"));
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(text);
        let rpc_status = error
            .and_then(|e| e.get("status"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let reason = error
            .and_then(|e| e.get("details"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find_map(|d| d.get("reason").and_then(Value::as_str))
            .unwrap_or_default();

        let code_hint = match (rpc_status, reason) {
            (_, "API_KEY_INVALID" | "API_KEY_EXPIRED") | ("UNAUTHENTICATED", _) => {
                Some(ErrorKind::Authentication)
            }
            (_, "BILLING_DISABLED") => Some(ErrorKind::Billing),
            // Free-tier keys get a bare INVALID_ARGUMENT with this wording.
            ("INVALID_ARGUMENT", _) if message.contains("only accessible to billed users") => {
                Some(ErrorKind::Billing)
            }
            _ => None,
        };
        UpstreamFailure::new(status, code_hint, message).classify()
    }

    async fn attempt(&self, body: &ImagenRequest) -> Result<Extracted> {
        let request = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .json(body);
        let request = self.authorized(request, &self.api_key);
        let raw = http::send_json(request, Self::parse_error).await?;
        let parsed: ImagenResponse = serde_json::from_value(raw.clone())?;

        let image_urls = parsed
            .images
            .into_iter()
            .filter_map(|image| {
                if let Some(b64) = image.base64.filter(|v| !v.is_empty()) {
                    let mime_type = image.mime_type.as_deref().unwrap_or("image/png");
                    Some(to_data_uri(mime_type, &b64))
                } else {
                    image.url.filter(|v| !v.is_empty())
                }
            })
            .collect();

        Extracted {
            image_urls,
            revised_prompts: Vec::new(),
            raw,
        }
        .non_empty(ProviderKind::Imagen)
    }
}

#[async_trait]
impl ProviderAdapter for ImagenAdapter {
    async fn generate_images(
        &self,
        prompt: &str,
        options: &ImageGenerationOptions,
    ) -> Result<ImageGenerationResult> {
        let start = Instant::now();
        let sanitized = prepare_prompt(prompt, ProviderKind::Imagen)?;
        let body = ImagenRequest::from_options(sanitized, options, self.default_model);

        tracing::debug!(model = %body.model, n = body.n, "submitting Imagen generation request");
        let body = &body;
        let (extracted, attempts) =
            run_with_retries(ProviderKind::Imagen, &self.retry, |_| self.attempt(body)).await?;
        tracing::debug!(images = extracted.image_urls.len(), attempts, "Imagen generation complete");

        Ok(extracted.into_result(ProviderKind::Imagen, &body.model, prompt, attempts, start))
    }

    async fn validate_api_key(&self, api_key: &str) -> ApiKeyValidationResult {
        if api_key.trim().is_empty() {
            return http::blank_key(ProviderKind::Imagen);
        }
        let request = self.authorized(self.client.get(format!("{}/models", self.base_url)), api_key);
        http::check_key(
            ProviderKind::Imagen,
            request,
            self.default_model.as_str(),
            "Invalid Gemini API key. Check the key at aistudio.google.com/apikey.",
            Self::parse_error,
        )
        .await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Imagen
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
struct ImagenRequest {
    model: String,
    prompt: String,
    n: u32,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<AspectRatio>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ImagenRequest {
    fn from_options(prompt: String, options: &ImageGenerationOptions, default_model: ImagenModel) -> Self {
        let model = options.model_or(default_model.as_str()).to_string();
        Self {
            n: options.clamped_count(ImagenModel::max_images_for(&model)),
            // Imagen only ever returns inline payloads.
            response_format: "b64_json",
            aspect_ratio: ImagenAdapter::resolve_aspect_ratio(options),
            extra: http::passthrough(
                ProviderKind::Imagen,
                &options.additional_params,
                PASSTHROUGH_PARAMS,
            ),
            model,
            prompt,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagenResponse {
    #[serde(default, alias = "data", alias = "predictions")]
    images: Vec<ImagenImage>,
}

#[derive(Debug, Deserialize)]
struct ImagenImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "b64_json", alias = "bytesBase64Encoded")]
    base64: Option<String>,
    #[serde(default, alias = "mimeType")]
    mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn adapter(server: &MockServer) -> ImagenAdapter {
        let config = AdapterConfig::new("goog-key")
            .with_base_url(Some(server.url("/v1beta/openai")))
            .with_retry(RetryPolicy::new(3, Duration::from_millis(1)));
        ImagenAdapter::new(&config)
    }

    #[test]
    fn test_imagen_model_as_str() {
        assert_eq!(ImagenModel::Imagen3.as_str(), "imagen-3.0-generate-002");
        assert_eq!(ImagenModel::default(), ImagenModel::Imagen3);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let adapter = ImagenAdapterBuilder::new()
            .api_key("test-key")
            .model(ImagenModel::Imagen4)
            .build()
            .unwrap();
        assert_eq!(adapter.default_model, ImagenModel::Imagen4);
    }

    #[test]
    fn test_request_drops_quality_and_style() {
        let opts = ImageGenerationOptions::new()
            .with_quality("hd")
            .with_style("vivid")
            .with_count(9)
            .with_aspect_ratio("16:9");
        let req = ImagenRequest::from_options("A puppy".into(), &opts, ImagenModel::Imagen3);
        let json = serde_json::to_value(&req).unwrap();

        assert!(json.get("quality").is_none());
        assert!(json.get("style").is_none());
        assert_eq!(json["n"], 4);
        assert_eq!(json["aspect_ratio"], "16:9");
        assert_eq!(json["response_format"], "b64_json");
    }

    #[test]
    fn test_ultra_model_clamps_to_one() {
        let opts = ImageGenerationOptions::new()
            .with_model("imagen-4.0-ultra-generate-001")
            .with_count(3);
        let req = ImagenRequest::from_options("x".into(), &opts, ImagenModel::Imagen3);
        assert_eq!(req.n, 1);
    }

    #[test]
    fn test_aspect_ratio_resolution() {
        let opts = ImageGenerationOptions::new().with_aspect_ratio("21:9");
        assert_eq!(ImagenAdapter::resolve_aspect_ratio(&opts), None);

        let opts = ImageGenerationOptions::new().with_size("1792x1024");
        assert_eq!(ImagenAdapter::resolve_aspect_ratio(&opts), Some(AspectRatio::Landscape));

        assert_eq!(ImagenAdapter::resolve_aspect_ratio(&ImageGenerationOptions::new()), None);
    }

    #[test]
    fn test_passthrough_params() {
        let opts = ImageGenerationOptions::new()
            .with_param("person_generation", "dont_allow")
            .with_param("guidance", 7);
        let req = ImagenRequest::from_options("x".into(), &opts, ImagenModel::Imagen3);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["person_generation"], "dont_allow");
        assert!(json.get("guidance").is_none());
    }

    #[test]
    fn test_response_shapes() {
        let resp: ImagenResponse = serde_json::from_value(json!({
            "images": [{"base64": "AQID", "mimeType": "image/jpeg"}, {"url": "https://x/1.png"}]
        }))
        .unwrap();
        assert_eq!(resp.images.len(), 2);
        assert_eq!(resp.images[0].mime_type.as_deref(), Some("image/jpeg"));

        let resp: ImagenResponse =
            serde_json::from_value(json!({"data": [{"b64_json": "AQID"}]})).unwrap();
        assert_eq!(resp.images[0].base64.as_deref(), Some("AQID"));
    }

    #[test]
    fn test_parse_error_google_shapes() {
        let body = r#"[{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT", "details": [{"reason": "API_KEY_INVALID"}]}}]"#;
        assert_eq!(ImagenAdapter::parse_error(400, body).kind(), ErrorKind::Authentication);

        let body = r#"{"error": {"code": 403, "message": "This API method requires billing to be enabled.", "status": "PERMISSION_DENIED", "details": [{"reason": "BILLING_DISABLED"}]}}"#;
        assert_eq!(ImagenAdapter::parse_error(403, body).kind(), ErrorKind::Billing);

        let body = r#"[{"error": {"code": 400, "message": "Imagen API is only accessible to billed users at this time.", "status": "INVALID_ARGUMENT"}}]"#;
        let err = ImagenAdapter::parse_error(400, body);
        assert_eq!(err.kind(), ErrorKind::Billing);
        assert!(!err.is_retryable());

        let body = r#"{"error": {"code": 400, "message": "Image generation failed due to safety filters.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(ImagenAdapter::parse_error(400, body).kind(), ErrorKind::ContentPolicy);

        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(ImagenAdapter::parse_error(429, body).kind(), ErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_generate_sends_both_key_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/openai/images/generations")
                    .header("authorization", "Bearer goog-key")
                    .header("x-goog-api-key", "goog-key")
                    .body_includes("\"model\":\"imagen-3.0-generate-002\"");
                then.status(200).json_body(json!({
                    "images": [{"base64": "AQID", "mimeType": "image/png"}, {"base64": "BAUG"}]
                }));
            })
            .await;

        let result = adapter(&server)
            .generate_images("A puppy", &ImageGenerationOptions::new().with_count(2))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            result.image_urls,
            vec!["data:image/png;base64,AQID", "data:image/png;base64,BAUG"]
        );
        assert_eq!(result.metadata.model, "imagen-3.0-generate-002");
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_attempts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/openai/images/generations");
                then.status(429).json_body(json!({
                    "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
                }));
            })
            .await;

        let err = adapter(&server)
            .generate_images("A puppy", &ImageGenerationOptions::new())
            .await
            .unwrap_err();

        mock.assert_calls_async(3).await;
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_validate_key_with_models_listing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1beta/openai/models")
                    .header("x-goog-api-key", "user-key");
                then.status(200).json_body(json!({
                    "data": [{"id": "models/gemini-2.0-flash"}, {"id": "models/imagen-3.0-generate-002"}]
                }));
            })
            .await;

        let result = adapter(&server).validate_api_key("user-key").await;
        assert!(result.is_valid);
        assert_eq!(result.details["has_expected_model"], true);
    }

    #[tokio::test]
    async fn test_validate_key_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1beta/openai/models");
                then.status(400).json_body(json!([{
                    "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT",
                              "details": [{"reason": "API_KEY_INVALID"}]}
                }]));
            })
            .await;

        let result = adapter(&server).validate_api_key("bad").await;
        assert!(!result.is_valid);
        assert!(result.message.contains("Invalid Gemini API key"));
    }
}
