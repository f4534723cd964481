//! OpenAI image generation adapter (dall-e-3, dall-e-2, gpt-image-1).

use crate::config::{AdapterConfig, RetryPolicy};
use crate::error::{ErrorKind, ImageGenerationError, Result};
use crate::image::classify::UpstreamFailure;
use crate::image::provider::ProviderAdapter;
use crate::image::providers::http::{self, Extracted};
use crate::image::retry::run_with_retries;
use crate::image::sanitize::prepare_prompt;
use crate::image::types::{
    parse_size, to_data_uri, ApiKeyValidationResult, AspectRatio, ImageGenerationOptions,
    ImageGenerationResult, ProviderKind, ResponseFormat,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI image model families. Each has its own parameter allow-list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenAiImageModel {
    /// DALL-E 3: one image per call, quality and style supported.
    #[default]
    DallE3,
    /// DALL-E 2: square sizes only, no quality or style.
    DallE2,
    /// GPT Image 1: always returns base64, rejects `response_format` and `style`.
    GptImage1,
}

impl OpenAiImageModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DallE3 => "dall-e-3",
            Self::DallE2 => "dall-e-2",
            Self::GptImage1 => "gpt-image-1",
        }
    }

    /// Family of a model id, matched case-insensitively; unrecognized ids
    /// get the DALL-E 3 rules.
    pub fn family(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("gpt-image") {
            Self::GptImage1
        } else if model.starts_with("dall-e-2") {
            Self::DallE2
        } else {
            Self::DallE3
        }
    }

    fn max_images(&self) -> u32 {
        match self {
            Self::DallE3 => 1,
            Self::DallE2 | Self::GptImage1 => 10,
        }
    }

    fn accepts_quality(&self, quality: &str) -> bool {
        match self {
            Self::DallE3 => matches!(quality, "standard" | "hd"),
            Self::GptImage1 => matches!(quality, "low" | "medium" | "high" | "auto"),
            Self::DallE2 => false,
        }
    }

    fn accepts_style(&self, style: &str) -> bool {
        matches!(self, Self::DallE3) && matches!(style, "vivid" | "natural")
    }

    fn accepts_response_format(&self) -> bool {
        !matches!(self, Self::GptImage1)
    }

    fn passthrough_params(&self) -> &'static [&'static str] {
        match self {
            Self::GptImage1 => &[
                "background",
                "moderation",
                "output_format",
                "output_compression",
            ],
            Self::DallE3 | Self::DallE2 => &[],
        }
    }
}

/// Builder for OpenAiAdapter.
#[derive(Debug, Clone, Default)]
pub struct OpenAiAdapterBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: OpenAiImageModel,
    retry: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl OpenAiAdapterBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `OPENAI_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root (default `https://api.openai.com/v1`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model used when a call does not name one.
    pub fn model(mut self, model: OpenAiImageModel) -> Self {
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
    pub fn build(self) -> Result<OpenAiAdapter> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                ImageGenerationError::new(
                    ErrorKind::Authentication,
                    "OPENAI_API_KEY not set and no API key provided",
                )
            })?;

        let mut config = AdapterConfig::new(api_key)
            .with_base_url(self.base_url)
            .with_retry(self.retry);
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(timeout);
        }
        Ok(OpenAiAdapter::new(&config).with_default_model(self.model))
    }
}

/// OpenAI image generation adapter.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: OpenAiImageModel,
    retry: RetryPolicy,
}

impl OpenAiAdapter {
    /// Creates a new `OpenAiAdapterBuilder`.
    pub fn builder() -> OpenAiAdapterBuilder {
        OpenAiAdapterBuilder::new()
    }

    /// Creates an adapter from explicit settings. Never fails.
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            client: config.http_client(),
            api_key: config.api_key.clone(),
            base_url: config.resolve_base_url(DEFAULT_BASE_URL),
            default_model: OpenAiImageModel::default(),
            retry: config.retry,
        }
    }

    fn with_default_model(mut self, model: OpenAiImageModel) -> Self {
        self.default_model = model;
        self
    }

    /// Maps an aspect ratio to the closest size the model family supports.
    fn size_for_aspect_ratio(ratio: AspectRatio, family: OpenAiImageModel) -> Option<&'static str> {
        let landscape = matches!(
            ratio,
            AspectRatio::Landscape | AspectRatio::Standard | AspectRatio::Ultrawide
        );
        let portrait = matches!(ratio, AspectRatio::Portrait | AspectRatio::StandardPortrait);
        match family {
            OpenAiImageModel::DallE3 if landscape => Some("1792x1024"),
            OpenAiImageModel::DallE3 if portrait => Some("1024x1792"),
            OpenAiImageModel::GptImage1 if landscape => Some("1536x1024"),
            OpenAiImageModel::GptImage1 if portrait => Some("1024x1536"),
            OpenAiImageModel::DallE2 if landscape || portrait => None,
            _ => Some("1024x1024"),
        }
    }

    fn resolve_size(options: &ImageGenerationOptions, family: OpenAiImageModel) -> Option<String> {
        if let Some(size) = ImageGenerationOptions::non_blank(&options.size) {
            if parse_size(&size).is_some() {
                return Some(size);
            }
            tracing::debug!(size = %size, "dropping malformed size");
        }
        let ratio = options.aspect_ratio.as_deref()?.parse::<AspectRatio>().ok()?;
        Self::size_for_aspect_ratio(ratio, family).map(str::to_string)
    }

    fn parse_error(status: u16, text: &str) -> ImageGenerationError {
        let body = http::error_body(text);
        let error = body.as_ref().and_then(|b| b.get("error"));
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(text);
        let code = error
            .and_then(|e| e.get("code").or_else(|| e.get("type")))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let code_hint = match code {
            "invalid_api_key" | "invalid_organization" | "account_deactivated" => {
                Some(ErrorKind::Authentication)
            }
            "billing_hard_limit_reached" | "insufficient_quota" | "billing_not_active" => {
                Some(ErrorKind::Billing)
            }
            "content_policy_violation" | "moderation_blocked" => Some(ErrorKind::ContentPolicy),
            _ => None,
        };
        UpstreamFailure::new(status, code_hint, message).classify()
    }

    async fn attempt(&self, body: &OpenAiImageRequest, mime_type: &str) -> Result<Extracted> {
        let request = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);
        let raw = http::send_json(request, Self::parse_error).await?;
        let parsed: OpenAiImageResponse = serde_json::from_value(raw.clone())?;

        let mut image_urls = Vec::with_capacity(parsed.data.len());
        let mut revised_prompts = Vec::new();
        for item in parsed.data {
            if let Some(prompt) = item.revised_prompt.filter(|p| !p.trim().is_empty()) {
                revised_prompts.push(prompt);
            }
            if let Some(b64) = item.b64_json.filter(|v| !v.is_empty()) {
                image_urls.push(to_data_uri(mime_type, &b64));
            } else if let Some(url) = item.url.filter(|v| !v.is_empty()) {
                image_urls.push(url);
            }
        }

        Extracted {
            image_urls,
            revised_prompts,
            raw,
        }
        .non_empty(ProviderKind::OpenAi)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn generate_images(
        &self,
        prompt: &str,
        options: &ImageGenerationOptions,
    ) -> Result<ImageGenerationResult> {
        let start = Instant::now();
        let sanitized = prepare_prompt(prompt, ProviderKind::OpenAi)?;
        let body = OpenAiImageRequest::from_options(sanitized, options, self.default_model);
        let mime_type = body.output_mime_type();

        tracing::debug!(model = %body.model, n = body.n, "submitting OpenAI image generation request");
        let body = &body;
        let (extracted, attempts) = run_with_retries(ProviderKind::OpenAi, &self.retry, |_| {
            self.attempt(body, mime_type)
        })
        .await?;
        tracing::debug!(images = extracted.image_urls.len(), attempts, "OpenAI image generation complete");

        Ok(extracted.into_result(ProviderKind::OpenAi, &body.model, prompt, attempts, start))
    }

    async fn validate_api_key(&self, api_key: &str) -> ApiKeyValidationResult {
        if api_key.trim().is_empty() {
            return http::blank_key(ProviderKind::OpenAi);
        }
        let request = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key);
        http::check_key(
            ProviderKind::OpenAi,
            request,
            self.default_model.as_str(),
            "Invalid OpenAI API key. Check the key at platform.openai.com/api-keys.",
            Self::parse_error,
        )
        .await
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}

#[derive(Debug, Serialize)]
struct OpenAiImageRequest {
    model: String,
    prompt: String,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl OpenAiImageRequest {
    fn from_options(
        prompt: String,
        options: &ImageGenerationOptions,
        default_model: OpenAiImageModel,
    ) -> Self {
        let model = options.model_or(default_model.as_str()).to_string();
        let family = OpenAiImageModel::family(&model);

        let quality = ImageGenerationOptions::non_blank(&options.quality)
            .filter(|q| family.accepts_quality(q));
        let style =
            ImageGenerationOptions::non_blank(&options.style).filter(|s| family.accepts_style(s));
        let response_format = family.accepts_response_format().then(|| {
            match options.resolved_response_format() {
                ResponseFormat::Url => "url",
                ResponseFormat::Base64 => "b64_json",
            }
        });

        Self {
            n: options.clamped_count(family.max_images()),
            size: OpenAiAdapter::resolve_size(options, family),
            quality,
            style,
            response_format,
            extra: http::passthrough(
                ProviderKind::OpenAi,
                &options.additional_params,
                family.passthrough_params(),
            ),
            model,
            prompt,
        }
    }

    /// MIME type of base64 payloads in the response.
    fn output_mime_type(&self) -> &'static str {
        match self.extra.get("output_format").and_then(Value::as_str) {
            Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "image/png",
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiImageResponse {
    #[serde(default)]
    data: Vec<OpenAiImageData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}
