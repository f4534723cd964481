//! Image provider adapter trait.

use crate::error::Result;
use crate::image::types::{
    ApiKeyValidationResult, ImageGenerationOptions, ImageGenerationResult, ProviderKind,
};
use async_trait::async_trait;

/// Uniform contract over one provider's image generation API.
///
/// Implementations hold only their credential and endpoint, both fixed at
/// construction, so a single instance can serve concurrent calls.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Generates images for `prompt`.
    ///
    /// The prompt is sanitized for the provider first; a prompt with no
    /// usable content fails with `INVALID_PROMPT` before any request is made.
    /// Transient failures are retried internally.
    async fn generate_images(
        &self,
        prompt: &str,
        options: &ImageGenerationOptions,
    ) -> Result<ImageGenerationResult>;

    /// Checks `api_key` against the provider's model listing.
    ///
    /// Never fails: every problem is reported as `is_valid = false`.
    async fn validate_api_key(&self, api_key: &str) -> ApiKeyValidationResult;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        self.kind().display_name()
    }
}
