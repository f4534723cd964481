//! Error taxonomy shared by every image generation adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on upstream error text carried into an error message.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Closed set of failure categories.
///
/// New provider integrations map their failures onto these kinds; callers
/// branch on them to pick user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing, invalid, revoked or expired credential.
    Authentication,
    /// Billing disabled, credits exhausted or hard spending limit reached.
    Billing,
    /// Too many requests.
    RateLimit,
    /// Prompt rejected by the provider's safety system.
    ContentPolicy,
    /// Prompt or parameters rejected as malformed.
    InvalidPrompt,
    /// Upstream 5xx or malformed successful response.
    ServerError,
    /// No response received (connect failure, timeout, abort).
    NetworkError,
    /// Anything the classifier could not place.
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 8] = [
        Self::Authentication,
        Self::Billing,
        Self::RateLimit,
        Self::ContentPolicy,
        Self::InvalidPrompt,
        Self::ServerError,
        Self::NetworkError,
        Self::Unknown,
    ];

    /// Whether a failure of this kind is worth re-attempting automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::ServerError | Self::NetworkError
        )
    }

    /// Returns the wire name (e.g. `"RATE_LIMIT"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "AUTHENTICATION",
            Self::Billing => "BILLING",
            Self::RateLimit => "RATE_LIMIT",
            Self::ContentPolicy => "CONTENT_POLICY",
            Self::InvalidPrompt => "INVALID_PROMPT",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified image generation failure.
///
/// `retryable` always agrees with [`ErrorKind::is_retryable`]; the only way
/// to build one is through the constructors below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ImageGenerationError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    retryable: bool,
}

impl ImageGenerationError {
    /// Creates an error with no HTTP status attached.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            retryable: kind.is_retryable(),
        }
    }

    /// Creates an error for a failed HTTP exchange.
    pub fn with_status(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status),
            ..Self::new(kind, message)
        }
    }

    /// Prompt empty after sanitization, or otherwise unusable.
    pub fn invalid_prompt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPrompt, message)
    }

    /// Upstream answered with a success status but an unusable payload.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, message)
    }

    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable detail, with credential material redacted.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the failed exchange, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Whether automatic re-attempt is appropriate.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Caller-facing guidance for this failure.
    pub fn user_hint(&self) -> &'static str {
        match self.kind {
            ErrorKind::Authentication => "Check your API key and save it again.",
            ErrorKind::Billing => "Check the billing status of your provider account.",
            ErrorKind::ContentPolicy => "The prompt was rejected by the provider's safety system. Rephrase it and resubmit.",
            ErrorKind::InvalidPrompt => "Fix the prompt or options and resubmit.",
            ErrorKind::RateLimit | ErrorKind::ServerError | ErrorKind::NetworkError => {
                "Temporary provider failure. Try again later."
            }
            ErrorKind::Unknown => "Generation failed. Check your settings and resubmit.",
        }
    }
}

impl From<reqwest::Error> for ImageGenerationError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let message = sanitize_error_message(&err.to_string());
        let kind = if err.is_decode() {
            ErrorKind::ServerError
        } else if err.is_builder() {
            ErrorKind::Unknown
        } else {
            ErrorKind::NetworkError
        };
        Self {
            status_code: status,
            ..Self::new(kind, message)
        }
    }
}

impl From<serde_json::Error> for ImageGenerationError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_response(format!("malformed provider response: {err}"))
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, ImageGenerationError>;

/// Redacts credential-looking tokens and bounds the length of upstream text.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = Vec::new();
    let mut redact_next = false;
    for word in text.split_whitespace() {
        let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_');
        if redact_next || looks_like_secret(bare) {
            out.push("[REDACTED]".to_string());
        } else {
            out.push(word.to_string());
        }
        redact_next = bare.eq_ignore_ascii_case("bearer");
    }

    let joined = out.join(" ");
    if joined.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

fn looks_like_secret(word: &str) -> bool {
    const PREFIXES: [&str; 4] = ["sk-", "xai-", "AIza", "sess-"];
    word.len() >= 12 && PREFIXES.iter().any(|p| word.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_follows_kind() {
        for kind in ErrorKind::ALL {
            let err = ImageGenerationError::new(kind, "x");
            assert_eq!(err.is_retryable(), kind.is_retryable(), "{kind}");
        }
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(!ErrorKind::Authentication.is_retryable());
        assert!(!ErrorKind::Billing.is_retryable());
        assert!(!ErrorKind::ContentPolicy.is_retryable());
        assert!(!ErrorKind::InvalidPrompt.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::RateLimit).unwrap();
        assert_eq!(json, "\"RATE_LIMIT\"");
        for kind in ErrorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_error_display() {
        let err = ImageGenerationError::with_status(ErrorKind::Authentication, 401, "bad key");
        assert_eq!(err.to_string(), "AUTHENTICATION: bad key");
        assert_eq!(err.status_code(), Some(401));
    }

    #[test]
    fn test_json_error_is_retryable_server_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ImageGenerationError::from(parse_err);
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.is_retryable());
        assert!(err.message().contains("malformed"));
    }

    #[test]
    fn test_sanitize_redacts_keys() {
        let msg = "Incorrect API key provided: sk-proj-abcdef123456. You can find your key";
        let clean = sanitize_error_message(msg);
        assert!(!clean.contains("sk-proj-abcdef123456"));
        assert!(clean.contains("[REDACTED]"));

        let clean = sanitize_error_message("header was Bearer abc.def.ghi rejected");
        assert_eq!(clean, "header was Bearer [REDACTED] rejected");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "word ".repeat(400);
        let clean = sanitize_error_message(&long);
        assert!(clean.ends_with("..."));
        assert_eq!(clean.chars().count(), MAX_ERROR_MESSAGE_CHARS + 3);
    }

    #[test]
    fn test_user_hint_groups_transient_failures() {
        let a = ImageGenerationError::new(ErrorKind::RateLimit, "x").user_hint();
        let b = ImageGenerationError::new(ErrorKind::NetworkError, "x").user_hint();
        assert_eq!(a, b);
        let c = ImageGenerationError::new(ErrorKind::InvalidPrompt, "x").user_hint();
        assert_ne!(a, c);
    }
}
