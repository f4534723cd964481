//! Offline stub adapter for development and tests.
//!
//! Returns fixed placeholder images after an artificial delay. Makes no
//! network calls and consumes no provider credits.

use crate::config::AdapterConfig;
use crate::error::Result;
use crate::image::provider::ProviderAdapter;
use crate::image::sanitize::prepare_prompt;
use crate::image::types::{
    to_data_uri, ApiKeyValidationResult, GenerationMetadata, ImageGenerationOptions,
    ImageGenerationResult, ProviderKind, ResponseFormat,
};
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};

const MOCK_MODEL: &str = "mock-image-v1";
const MAX_IMAGES: u32 = 4;
/// 1x1 transparent PNG.
const PLACEHOLDER_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Deterministic stub honoring the adapter contract.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    delay: Duration,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new(&AdapterConfig::default())
    }
}

impl MockAdapter {
    /// Creates a stub using the config's mock delay.
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            delay: config.mock_delay,
        }
    }

    /// Sets the artificial latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Placeholder URL for the `index`-th (1-based) image.
    pub fn placeholder_url(index: u32) -> String {
        format!("https://placehold.co/1024x1024/png?text=Mock+Image+{index}")
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn generate_images(
        &self,
        prompt: &str,
        options: &ImageGenerationOptions,
    ) -> Result<ImageGenerationResult> {
        let start = Instant::now();
        prepare_prompt(prompt, ProviderKind::Mock)?;

        let count = options.clamped_count(MAX_IMAGES);
        let model = options.model_or(MOCK_MODEL).to_string();
        tokio::time::sleep(self.delay).await;

        let image_urls: Vec<String> = (1..=count)
            .map(|i| match options.resolved_response_format() {
                ResponseFormat::Url => Self::placeholder_url(i),
                ResponseFormat::Base64 => to_data_uri("image/png", PLACEHOLDER_PNG_B64),
            })
            .collect();
        tracing::debug!(images = image_urls.len(), "mock image generation complete");

        Ok(ImageGenerationResult {
            raw_response: json!({ "mock": true, "count": count }),
            metadata: GenerationMetadata {
                model,
                prompt: prompt.to_string(),
                provider: Some(ProviderKind::Mock),
                revised_prompts: Vec::new(),
                attempts: 1,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            image_urls,
        })
    }

    async fn validate_api_key(&self, api_key: &str) -> ApiKeyValidationResult {
        if api_key.trim().is_empty() {
            return ApiKeyValidationResult::invalid("API key is empty", json!({ "mock": true }));
        }
        ApiKeyValidationResult::valid(
            "Mock API key accepted",
            json!({ "mock": true, "models": [MOCK_MODEL], "has_expected_model": true }),
        )
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }
}
