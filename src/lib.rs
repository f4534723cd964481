#![warn(missing_docs)]
//! byokgen - bring-your-own-key image generation.
//!
//! One uniform contract over several image generation APIs. Callers hand in
//! a provider id and a user-supplied key; the matching adapter sanitizes the
//! prompt, builds the provider's request, retries transient failures and
//! classifies everything else into a small closed error taxonomy.
//!
//! # Quick Start
//!
//! ```no_run
//! use byokgen::{AdapterFactory, ImageGenerationOptions, ProviderAdapter};
//!
//! #[tokio::main]
//! async fn main() -> byokgen::Result<()> {
//!     let adapter = AdapterFactory::create("xai", "xai-...", None, false);
//!     let options = ImageGenerationOptions::new().with_count(2);
//!     let result = adapter.generate_images("A lighthouse at dusk", &options).await?;
//!     for url in &result.image_urls {
//!         println!("{url}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! Every failure is an [`ImageGenerationError`] whose [`ErrorKind`] tells the
//! caller what to show: non-retryable kinds mean "fix your input or
//! credential", retryable ones were already retried and mean "try again
//! later".
//!
//! # Providers
//! - `openai`: DALL-E 3, DALL-E 2, GPT Image
//! - `imagen` (`gemini`, `google`): Imagen through the Gemini API
//! - `xai` (`grok`): Grok image models
//! - `mock`: offline stub

pub mod config;
mod error;
pub mod image;

// Re-export error types at crate root
pub use error::{ErrorKind, ImageGenerationError, Result};

pub use config::{AdapterConfig, RetryPolicy};
pub use image::sanitize::sanitize;
pub use image::{
    Adapter, AdapterFactory, ApiKeyValidationResult, AspectRatio, GenerationMetadata,
    ImageGenerationOptions, ImageGenerationResult, ProviderAdapter, ProviderKind, ResponseFormat,
};
pub use image::providers::{
    ImagenAdapter, ImagenAdapterBuilder, ImagenModel, MockAdapter, OpenAiAdapter,
    OpenAiAdapterBuilder, OpenAiImageModel, XaiAdapter, XaiAdapterBuilder, XaiModel,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorKind, ImageGenerationError, Result};
    pub use crate::image::{
        AdapterFactory, ImageGenerationOptions, ImageGenerationResult, ProviderAdapter,
    };
}
