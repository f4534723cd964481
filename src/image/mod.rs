//! Image generation module.

pub(crate) mod classify;
mod factory;
mod provider;
pub mod providers;
pub(crate) mod retry;
pub mod sanitize;
mod types;

pub use factory::{Adapter, AdapterFactory};
pub use provider::ProviderAdapter;
pub use types::{
    decode_data_uri, extension_for_mime, to_data_uri, ApiKeyValidationResult, AspectRatio,
    GenerationMetadata, ImageGenerationOptions, ImageGenerationResult, ProviderKind,
    ResponseFormat,
};
