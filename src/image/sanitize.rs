//! Prompt sanitization.
//!
//! Some upstream transports reject any non-ASCII byte in the request body.
//! For those providers every character outside printable ASCII (32..=126)
//! is replaced by exactly one space, so positions never shift between the
//! original and the sanitized prompt. Other providers only lose control
//! characters.

use crate::error::{ImageGenerationError, Result};
use crate::image::types::ProviderKind;

/// Sanitizes `prompt` for the provider named by `provider_id`.
///
/// Unknown ids are treated like the default provider.
pub fn sanitize(prompt: &str, provider_id: &str) -> String {
    sanitize_for(prompt, ProviderKind::resolve(provider_id))
}

/// Sanitizes `prompt` for `provider`.
pub fn sanitize_for(prompt: &str, provider: ProviderKind) -> String {
    if provider.requires_ascii_prompt() {
        strict_ascii(prompt)
    } else {
        strip_control(prompt)
    }
}

/// Sanitizes and rejects prompts with no usable content.
///
/// Returns `INVALID_PROMPT` when the result is empty or all whitespace.
pub fn prepare_prompt(prompt: &str, provider: ProviderKind) -> Result<String> {
    let sanitized = sanitize_for(prompt, provider);
    if sanitized.trim().is_empty() {
        return Err(ImageGenerationError::invalid_prompt(
            "prompt is empty after removing unsupported characters",
        ));
    }
    Ok(sanitized)
}

fn strict_ascii(prompt: &str) -> String {
    prompt
        .chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
        .collect()
}

fn strip_control(prompt: &str) -> String {
    prompt
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}
