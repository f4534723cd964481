//! Provider selection.

use crate::config::AdapterConfig;
use crate::error::Result;
use crate::image::provider::ProviderAdapter;
use crate::image::providers::{ImagenAdapter, MockAdapter, OpenAiAdapter, XaiAdapter};
use crate::image::types::{
    ApiKeyValidationResult, ImageGenerationOptions, ImageGenerationResult, ProviderKind,
};
use async_trait::async_trait;

/// One of the supported adapters.
#[derive(Debug, Clone)]
pub enum Adapter {
    /// OpenAI.
    OpenAi(OpenAiAdapter),
    /// Google Imagen.
    Imagen(ImagenAdapter),
    /// xAI Grok.
    Xai(XaiAdapter),
    /// Offline stub.
    Mock(MockAdapter),
}

impl Adapter {
    fn inner(&self) -> &dyn ProviderAdapter {
        match self {
            Self::OpenAi(a) => a,
            Self::Imagen(a) => a,
            Self::Xai(a) => a,
            Self::Mock(a) => a,
        }
    }
}

#[async_trait]
impl ProviderAdapter for Adapter {
    async fn generate_images(
        &self,
        prompt: &str,
        options: &ImageGenerationOptions,
    ) -> Result<ImageGenerationResult> {
        self.inner().generate_images(prompt, options).await
    }

    async fn validate_api_key(&self, api_key: &str) -> ApiKeyValidationResult {
        self.inner().validate_api_key(api_key).await
    }

    fn kind(&self) -> ProviderKind {
        self.inner().kind()
    }
}

/// Maps provider identifiers to adapters.
pub struct AdapterFactory;

impl AdapterFactory {
    /// Creates the adapter for `provider_id`.
    ///
    /// Never fails. Identifiers are trimmed and lowercased; unknown ones fall
    /// back to OpenAI with a warning. `use_mock` selects the offline stub
    /// regardless of provider.
    pub fn create(
        provider_id: &str,
        api_key: &str,
        base_url: Option<&str>,
        use_mock: bool,
    ) -> Adapter {
        let config = AdapterConfig::from_env(api_key).with_base_url(base_url);
        Self::create_with_config(provider_id, &config, use_mock)
    }

    /// Like [`AdapterFactory::create`] with explicit settings.
    pub fn create_with_config(provider_id: &str, config: &AdapterConfig, use_mock: bool) -> Adapter {
        if use_mock {
            return Adapter::Mock(MockAdapter::new(config));
        }

        let kind = ProviderKind::from_id(provider_id).unwrap_or_else(|| {
            let fallback = ProviderKind::resolve(provider_id);
            tracing::warn!(
                provider_id = %provider_id,
                %fallback,
                "unknown image provider, falling back to default adapter"
            );
            fallback
        });

        match kind {
            ProviderKind::OpenAi => Adapter::OpenAi(OpenAiAdapter::new(config)),
            ProviderKind::Imagen => Adapter::Imagen(ImagenAdapter::new(config)),
            ProviderKind::Xai => Adapter::Xai(XaiAdapter::new(config)),
            ProviderKind::Mock => Adapter::Mock(MockAdapter::new(config)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids_and_aliases() {
        let cases = [
            ("openai", ProviderKind::OpenAi),
            ("  OpenAI ", ProviderKind::OpenAi),
            ("gemini", ProviderKind::Imagen),
            ("imagen", ProviderKind::Imagen),
            ("Google", ProviderKind::Imagen),
            ("xai", ProviderKind::Xai),
            ("grok", ProviderKind::Xai),
            ("mock", ProviderKind::Mock),
        ];
        for (id, kind) in cases {
            assert_eq!(AdapterFactory::create(id, "k", None, false).kind(), kind, "{id}");
        }
    }

    #[test]
    fn test_unknown_falls_back_to_openai() {
        let adapter = AdapterFactory::create("totally-unknown-provider", "k", None, false);
        assert_eq!(adapter.kind(), ProviderKind::OpenAi);
        assert!(matches!(adapter, Adapter::OpenAi(_)));
    }

    #[test]
    fn test_use_mock_overrides_provider() {
        let adapter = AdapterFactory::create("xai", "k", Some("http://localhost:1"), true);
        assert_eq!(adapter.kind(), ProviderKind::Mock);
    }

    #[tokio::test]
    async fn test_enum_dispatch_reaches_inner_adapter() {
        let config = AdapterConfig::new("k").with_mock_delay(std::time::Duration::ZERO);
        let adapter = AdapterFactory::create_with_config("openai", &config, true);
        let result = adapter
            .generate_images("a boat", &ImageGenerationOptions::new().with_count(3))
            .await
            .unwrap();
        assert_eq!(result.image_urls.len(), 3);
        assert!(adapter.validate_api_key("k").await.is_valid);
    }
}
