//! Grok (xAI) image generation adapter.
//!
//! The xAI endpoint rejects non-ASCII prompt bytes and unknown fields, so
//! prompts are strictly sanitized and the body carries only
//! `model`, `prompt`, `n` and `response_format`.

use crate::config::{AdapterConfig, RetryPolicy};
use crate::error::{ErrorKind, ImageGenerationError, Result};
use crate::image::classify::UpstreamFailure;
use crate::image::provider::ProviderAdapter;
use crate::image::providers::http::{self, Extracted};
use crate::image::retry::run_with_retries;
use crate::image::sanitize::prepare_prompt;
use crate::image::types::{
    to_data_uri, ApiKeyValidationResult, ImageGenerationOptions, ImageGenerationResult,
    ProviderKind, ResponseFormat,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const MAX_IMAGES: u32 = 10;
/// xAI returns JPEG payloads.
const B64_MIME_TYPE: &str = "image/jpeg";

/// Grok image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum XaiModel {
    /// Grok 2 Image.
    #[default]
    Grok2Image,
    /// Grok Imagine.
    GrokImagine,
}

impl XaiModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grok2Image => "grok-2-image",
            Self::GrokImagine => "grok-imagine-image",
        }
    }
}

/// Builder for XaiAdapter.
#[derive(Debug, Clone, Default)]
pub struct XaiAdapterBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: XaiModel,
    retry: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl XaiAdapterBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `XAI_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root (default `https://api.x.ai/v1`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the Grok model variant.
    pub fn model(mut self, model: XaiModel) -> Self {
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
    pub fn build(self) -> Result<XaiAdapter> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("XAI_API_KEY").ok())
            .ok_or_else(|| {
                ImageGenerationError::new(
                    ErrorKind::Authentication,
                    "XAI_API_KEY not set and no API key provided",
                )
            })?;

        let mut config = AdapterConfig::new(api_key)
            .with_base_url(self.base_url)
            .with_retry(self.retry);
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(timeout);
        }
        Ok(XaiAdapter::new(&config).with_default_model(self.model))
    }
}

/// Grok image generation adapter.
#[derive(Debug, Clone)]
pub struct XaiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: XaiModel,
    retry: RetryPolicy,
}

impl XaiAdapter {
    /// Creates a new `XaiAdapterBuilder`.
    pub fn builder() -> XaiAdapterBuilder {
        XaiAdapterBuilder::new()
    }

    /// Creates an adapter from explicit settings. Never fails.
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            client: config.http_client(),
            api_key: config.api_key.clone(),
            base_url: config.resolve_base_url(DEFAULT_BASE_URL),
            default_model: XaiModel::default(),
            retry: config.retry,
        }
    }

    fn with_default_model(mut self, model: XaiModel) -> Self {
        self.default_model = model;
        self
    }

    /// xAI errors come as `{"code": "...", "error": "..."}` or the
    /// OpenAI-style `{"error": {"message": "...", "code": "..."}}`.
    fn parse_error(status: u16, text: &str) -> ImageGenerationError {
        let body = http::error_body(text);
        let error = body.as_ref().and_then(|b| b.get("error"));
        let message = error
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
            .unwrap_or(text);
        let code = error
            .and_then(|e| e.get("code"))
            .or_else(|| body.as_ref().and_then(|b| b.get("code")))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let code_hint = match code {
            "invalid_api_key" => Some(ErrorKind::Authentication),
            "insufficient_credits" | "spending_limit_reached" => Some(ErrorKind::Billing),
            _ => None,
        };
        UpstreamFailure::new(status, code_hint, message).classify()
    }

    async fn attempt(&self, body: &XaiRequest) -> Result<Extracted> {
        let request = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);
        let raw = http::send_json(request, Self::parse_error).await?;
        let parsed: XaiResponse = serde_json::from_value(raw.clone())?;

        let mut image_urls = Vec::with_capacity(parsed.data.len());
        let mut revised_prompts = Vec::new();
        for item in parsed.data {
            if let Some(prompt) = item.revised_prompt.filter(|p| !p.trim().is_empty()) {
                revised_prompts.push(prompt);
            }
            if let Some(b64) = item.b64_json.filter(|v| !v.is_empty()) {
                image_urls.push(to_data_uri(B64_MIME_TYPE, &b64));
            } else if let Some(url) = item.url.filter(|v| !v.is_empty()) {
                image_urls.push(url);
            }
        }

        Extracted {
            image_urls,
            revised_prompts,
            raw,
        }
        .non_empty(ProviderKind::Xai)
    }
}

#[async_trait]
impl ProviderAdapter for XaiAdapter {
    async fn generate_images(
        &self,
        prompt: &str,
        options: &ImageGenerationOptions,
    ) -> Result<ImageGenerationResult> {
        let start = Instant::now();
        let sanitized = prepare_prompt(prompt, ProviderKind::Xai)?;
        let body = XaiRequest::from_options(sanitized, options, self.default_model);

        tracing::debug!(model = %body.model, n = body.n, "submitting xAI image generation request");
        let body = &body;
        let (extracted, attempts) =
            run_with_retries(ProviderKind::Xai, &self.retry, |_| self.attempt(body)).await?;
        tracing::debug!(images = extracted.image_urls.len(), attempts, "xAI image generation complete");

        Ok(extracted.into_result(ProviderKind::Xai, &body.model, prompt, attempts, start))
    }

    async fn validate_api_key(&self, api_key: &str) -> ApiKeyValidationResult {
        if api_key.trim().is_empty() {
            return http::blank_key(ProviderKind::Xai);
        }
        let request = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key);
        http::check_key(
            ProviderKind::Xai,
            request,
            self.default_model.as_str(),
            "Invalid xAI API key. Check the key at console.x.ai.",
            Self::parse_error,
        )
        .await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Xai
    }
}

/// Complete xAI request body. Quality, style, size and aspect ratio have no
/// field here and can never be sent.
#[derive(Debug, Serialize)]
struct XaiRequest {
    model: String,
    prompt: String,
    n: u32,
    response_format: &'static str,
}

impl XaiRequest {
    fn from_options(prompt: String, options: &ImageGenerationOptions, default_model: XaiModel) -> Self {
        let response_format = match options.resolved_response_format() {
            ResponseFormat::Url => "url",
            ResponseFormat::Base64 => "b64_json",
        };
        if !options.additional_params.is_empty() {
            tracing::debug!(
                params = options.additional_params.len(),
                "dropping passthrough parameters unsupported by xAI"
            );
        }
        Self {
            model: options.model_or(default_model.as_str()).to_string(),
            prompt,
            n: options.clamped_count(MAX_IMAGES),
            response_format,
        }
    }
}

#[derive(Debug, Deserialize)]
struct XaiResponse {
    #[serde(default)]
    data: Vec<XaiImageData>,
}

#[derive(Debug, Deserialize)]
struct XaiImageData {
    /// Base64-encoded image (when response_format is b64_json)
    #[serde(default)]
    b64_json: Option<String>,
    /// Image URL (when response_format is url)
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}
