//! Shared failure classification.
//!
//! Each adapter parses its provider's error body into an [`UpstreamFailure`]
//! (status, optional structured hint, message) and hands it to
//! [`UpstreamFailure::classify`]. The HTTP status is the primary signal.
//! Structured provider codes refine it next. Keyword matching on the message
//! is a last resort: it is heuristic, tracks provider wording that changes
//! without notice, and is not exhaustive.

use crate::error::{sanitize_error_message, ErrorKind, ImageGenerationError};

/// Provider-neutral view of a failed HTTP exchange.
#[derive(Debug, Clone)]
pub(crate) struct UpstreamFailure {
    pub status: u16,
    /// Kind implied by a structured provider error code, if any.
    pub code_hint: Option<ErrorKind>,
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(status: u16, code_hint: Option<ErrorKind>, message: impl Into<String>) -> Self {
        Self {
            status,
            code_hint,
            message: message.into(),
        }
    }

    /// Maps the failure onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            401 => return ErrorKind::Authentication,
            402 => return ErrorKind::Billing,
            429 => return ErrorKind::RateLimit,
            s if s >= 500 => return ErrorKind::ServerError,
            _ => {}
        }

        if let Some(kind) = self.code_hint {
            return kind;
        }

        let lower = self.message.to_lowercase();
        if mentions_any(&lower, CREDENTIAL_KEYWORDS) {
            return ErrorKind::Authentication;
        }
        if mentions_any(&lower, BILLING_KEYWORDS) {
            return ErrorKind::Billing;
        }

        // 422 is how some providers spell "bad request".
        if matches!(self.status, 400 | 422) {
            if mentions_any(&lower, CONTENT_POLICY_KEYWORDS) {
                return ErrorKind::ContentPolicy;
            }
            return ErrorKind::InvalidPrompt;
        }

        ErrorKind::Unknown
    }

    /// Builds the typed error.
    pub fn classify(&self) -> ImageGenerationError {
        let message = if self.message.trim().is_empty() {
            format!("provider returned HTTP {}", self.status)
        } else {
            sanitize_error_message(&self.message)
        };
        ImageGenerationError::with_status(self.kind(), self.status, message)
    }
}

const CREDENTIAL_KEYWORDS: &[&str] = &[
    "invalid api key",
    "incorrect api key",
    "api key not valid",
    "invalid_api_key",
    "api_key_invalid",
    "api key expired",
    "key has expired",
    "key was revoked",
    "invalid authentication",
    "unauthenticated",
];

const BILLING_KEYWORDS: &[&str] = &[
    "billing",
    "billed",
    "credit",
    "quota",
    "hard limit",
    "spending limit",
    "insufficient funds",
    "payment required",
];

const CONTENT_POLICY_KEYWORDS: &[&str] = &[
    "safety",
    "content policy",
    "content_policy",
    "moderation",
    "moderated",
    "blocked",
    "prohibited",
];

fn mentions_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(status: u16, message: &str) -> ErrorKind {
        UpstreamFailure::new(status, None, message).kind()
    }

    #[test]
    fn test_status_is_primary() {
        assert_eq!(kind(401, "anything"), ErrorKind::Authentication);
        assert_eq!(kind(402, ""), ErrorKind::Billing);
        assert_eq!(kind(429, "You exceeded your current quota"), ErrorKind::RateLimit);
        assert_eq!(kind(500, "safety"), ErrorKind::ServerError);
        assert_eq!(kind(503, ""), ErrorKind::ServerError);
    }

    #[test]
    fn test_code_hint_beats_keywords() {
        let failure = UpstreamFailure::new(400, Some(ErrorKind::Billing), "safety system");
        assert_eq!(failure.kind(), ErrorKind::Billing);
    }

    #[test]
    fn test_bad_request_refinement() {
        assert_eq!(kind(400, "Your request was rejected by our safety system"), ErrorKind::ContentPolicy);
        assert_eq!(kind(400, "prompt too long"), ErrorKind::InvalidPrompt);
        assert_eq!(kind(422, "Content moderated"), ErrorKind::ContentPolicy);
        assert_eq!(kind(400, "API key not valid. Please pass a valid API key."), ErrorKind::Authentication);
        assert_eq!(kind(400, "Billing hard limit has been reached"), ErrorKind::Billing);
        assert_eq!(
            kind(400, "Imagen API is only accessible to billed users at this time."),
            ErrorKind::Billing
        );
    }

    #[test]
    fn test_other_statuses() {
        assert_eq!(kind(403, "Your team has no credits left"), ErrorKind::Billing);
        assert_eq!(kind(403, "forbidden"), ErrorKind::Unknown);
        assert_eq!(kind(404, "not found"), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_sets_status_and_retryable() {
        let err = UpstreamFailure::new(429, None, "").classify();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.status_code(), Some(429));
        assert!(err.is_retryable());
        assert_eq!(err.message(), "provider returned HTTP 429");
    }
}
