//! HTTP plumbing shared by the provider adapters.

use crate::error::{ImageGenerationError, Result};
use crate::image::types::{
    ApiKeyValidationResult, GenerationMetadata, ImageGenerationResult, ProviderKind,
};
use serde_json::{json, Map, Value};
use std::time::Instant;

/// Cap on model ids echoed back in validation details.
const MAX_LISTED_MODELS: usize = 50;

/// Images pulled out of one successful response.
#[derive(Debug)]
pub(crate) struct Extracted {
    pub image_urls: Vec<String>,
    pub revised_prompts: Vec<String>,
    pub raw: Value,
}

impl Extracted {
    /// Fails with a retryable `SERVER_ERROR` when the payload held no images.
    pub fn non_empty(self, provider: ProviderKind) -> Result<Self> {
        if self.image_urls.is_empty() {
            return Err(ImageGenerationError::malformed_response(format!(
                "{provider} response contained no image data"
            )));
        }
        Ok(self)
    }

    /// Wraps up a successful call.
    pub fn into_result(
        self,
        provider: ProviderKind,
        model: &str,
        prompt: &str,
        attempts: u32,
        start: Instant,
    ) -> ImageGenerationResult {
        ImageGenerationResult {
            image_urls: self.image_urls,
            raw_response: self.raw,
            metadata: GenerationMetadata {
                model: model.to_string(),
                prompt: prompt.to_string(),
                provider: Some(provider),
                revised_prompts: self.revised_prompts,
                attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            },
        }
    }
}

/// Sends `request` and returns the parsed JSON body of a 2xx response.
///
/// Non-2xx responses go through `parse_error`; transport failures become
/// `NETWORK_ERROR` and unparseable bodies `SERVER_ERROR`.
pub(crate) async fn send_json<E>(request: reqwest::RequestBuilder, parse_error: E) -> Result<Value>
where
    E: Fn(u16, &str) -> ImageGenerationError,
{
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(parse_error(status.as_u16(), &text));
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Parses an error body as JSON, unwrapping a single-element array wrapper.
pub(crate) fn error_body(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(mut items) if !items.is_empty() => Some(items.swap_remove(0)),
        other => Some(other),
    }
}

/// Copies allow-listed passthrough parameters into a request's extra map.
pub(crate) fn passthrough(
    provider: ProviderKind,
    params: &Map<String, Value>,
    allowed: &[&str],
) -> Map<String, Value> {
    let mut extra = Map::new();
    for (key, value) in params {
        if allowed.contains(&key.as_str()) {
            extra.insert(key.clone(), value.clone());
        } else {
            tracing::debug!(%provider, param = %key, "dropping unsupported parameter");
        }
    }
    extra
}

/// Model ids from a `{data: [{id}]}` or `{models: [{name}]}` listing.
pub(crate) fn model_ids(listing: &Value) -> Vec<String> {
    let from_data = listing
        .get("data")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|m| m.get("id").and_then(Value::as_str));
    let from_models = listing
        .get("models")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|m| m.get("name").and_then(Value::as_str));

    from_data
        .chain(from_models)
        .map(|id| id.strip_prefix("models/").unwrap_or(id).to_string())
        .collect()
}

/// Sends a model-listing request. Any 2xx counts as success; a body that
/// is not JSON yields an empty listing.
async fn fetch_listing<E>(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
    parse_error: E,
) -> Result<Value>
where
    E: Fn(u16, &str) -> ImageGenerationError,
{
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(parse_error(status.as_u16(), &text));
    }
    Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::debug!(%provider, error = %e, "model listing is not JSON");
        Value::Null
    }))
}

/// Runs a model-listing request and turns the outcome into a validation
/// result. Never fails.
pub(crate) async fn check_key<E>(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
    expected_model: &str,
    auth_message: &str,
    parse_error: E,
) -> ApiKeyValidationResult
where
    E: Fn(u16, &str) -> ImageGenerationError,
{
    match fetch_listing(provider, request, parse_error).await {
        Ok(listing) => {
            let ids = model_ids(&listing);
            let has_expected_model = ids.iter().any(|id| id == expected_model);
            let message = if has_expected_model || ids.is_empty() {
                format!("{} API key is valid", provider.display_name())
            } else {
                tracing::debug!(%provider, model = %expected_model, "expected image model not listed");
                format!(
                    "{} API key is valid, but {expected_model} is not listed for this account",
                    provider.display_name()
                )
            };
            let models: Vec<&String> = ids.iter().take(MAX_LISTED_MODELS).collect();
            ApiKeyValidationResult::valid(
                message,
                json!({
                    "provider": provider,
                    "models": models,
                    "expected_model": expected_model,
                    "has_expected_model": has_expected_model,
                }),
            )
        }
        Err(err) => {
            tracing::debug!(%provider, kind = %err.kind(), "API key validation failed");
            let message = match err.kind() {
                crate::ErrorKind::Authentication => auth_message.to_string(),
                _ => err.message().to_string(),
            };
            ApiKeyValidationResult::invalid(
                message,
                json!({
                    "provider": provider,
                    "kind": err.kind(),
                    "status": err.status_code(),
                }),
            )
        }
    }
}

/// Validation result for a blank key; no request is made.
pub(crate) fn blank_key(provider: ProviderKind) -> ApiKeyValidationResult {
    ApiKeyValidationResult::invalid(
        "API key is empty",
        json!({ "provider": provider }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_from_both_shapes() {
        let listing = json!({"data": [{"id": "dall-e-3"}, {"id": "gpt-image-1"}]});
        assert_eq!(model_ids(&listing), vec!["dall-e-3", "gpt-image-1"]);

        let listing = json!({"models": [{"name": "models/imagen-3.0-generate-002"}]});
        assert_eq!(model_ids(&listing), vec!["imagen-3.0-generate-002"]);

        assert!(model_ids(&json!({})).is_empty());
    }

    #[test]
    fn test_error_body_unwraps_array() {
        let body = error_body(r#"[{"error": {"code": 400}}]"#).unwrap();
        assert_eq!(body["error"]["code"], 400);
        assert!(error_body("not json").is_none());
    }

    #[test]
    fn test_passthrough_filters_keys() {
        let mut params = Map::new();
        params.insert("seed".into(), json!(3));
        params.insert("temperature".into(), json!(0.5));
        let extra = passthrough(ProviderKind::Imagen, &params, &["seed"]);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra["seed"], 3);
    }

    #[test]
    fn test_empty_extraction_is_retryable() {
        let extracted = Extracted {
            image_urls: vec![],
            revised_prompts: vec![],
            raw: json!({"data": []}),
        };
        let err = extracted.non_empty(ProviderKind::OpenAi).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ServerError);
        assert!(err.is_retryable());
    }
}
