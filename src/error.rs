//! Error types for the docpolish library.
//!
//! Three distinct error types reflect three distinct failure scopes:
//!
//! * [`FormatError`] — **Fatal**: the request cannot produce a document at
//!   all (empty input, raw-text decode failure, formatting-plan generation
//!   exhausted its retries, renderer failure). Returned as
//!   `Err(FormatError)` from [`crate::format::format_document`].
//!
//! * [`ProviderError`] — a single remote-model call failed. Rate limits are
//!   retried by [`crate::pipeline::retry`]; everything else resolves to the
//!   calling component's documented fallback (vision analysis) or is
//!   promoted to a fatal error (plan generation).
//!
//! * [`CodecError`] — the external document codec or renderer could not
//!   decode/encode a rendition. Fatal only for the raw-text decode; the
//!   richer renditions degrade gracefully (fewer images, fewer tables).
//!
//! Non-fatal degradation (a missing image id, an out-of-range table index,
//! an unparseable model response) never surfaces here at all — those are
//! absorbed in place per component so one bad element cannot take down the
//! whole document.

use serde::Serialize;
use thiserror::Error;

/// All fatal errors returned by the docpolish library.
#[derive(Debug, Error)]
pub enum FormatError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No document bytes were supplied.
    #[error("No document provided: input buffer is empty")]
    EmptyInput,

    /// The input exceeds the declared size limit.
    #[error("Document is too large: {size} bytes (limit {limit})")]
    InputTooLarge { size: usize, limit: usize },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The codec could not produce the raw-text rendition. This is the only
    /// fatal extraction failure; image and table extraction degrade instead.
    #[error("Failed to decode document text: {detail}")]
    DecodeFailed { detail: String },

    // ── Plan errors ───────────────────────────────────────────────────────
    /// No text-generation model is configured and none could be resolved
    /// from the environment.
    #[error("No text model configured.\nSet GEMINI_API_KEY or supply a TextModel in FormatConfig.")]
    MissingTextModel,

    /// The plan-generation call failed after all retries.
    #[error("Formatting plan generation failed: {detail}")]
    PlanGeneration { detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The renderer could not serialise the assembled document tree.
    #[error("Failed to render output document: {detail}")]
    RenderFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed or a required collaborator is missing.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FormatError {
    /// The JSON error payload for the boundary layer: a stable top-level
    /// message plus the specific detail string.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: "Formatting failed".to_string(),
            details: self.to_string(),
        }
    }
}

/// Serialisable `{error, details}` payload returned for any fatal condition.
///
/// No partial binary output accompanies this — a request either yields a
/// complete rendered document or exactly one envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub details: String,
}

/// A failed call to a remote model collaborator.
///
/// The variants exist for retry classification and diagnostics; apart from
/// [`ProviderError::RateLimited`] they are all terminal for the call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// HTTP 429 — the only retryable condition.
    #[error("Rate limit exceeded: {message}")]
    RateLimited { message: String },

    /// The backing API is disabled for the supplied credential.
    #[error("Model service is disabled: {message}")]
    ServiceDisabled { message: String },

    /// Invalid credential or permission denied (401/403).
    #[error("Model credential rejected: {message}")]
    AuthDenied { message: String },

    /// Any other API or transport failure.
    #[error("Model call failed: {message}")]
    Api { message: String },
}

impl ProviderError {
    /// Whether [`crate::pipeline::retry::with_backoff`] may retry this call.
    ///
    /// Matches the explicit variant plus a "429" message substring, since
    /// some transports only surface the status inside the message text.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api { message } => message.contains("429"),
            _ => false,
        }
    }
}

/// Decode/encode failure from the external document codec or renderer.
#[derive(Debug, Clone, Error)]
#[error("document codec error: {0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(detail: impl Into<String>) -> Self {
        CodecError(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_has_stable_message() {
        let e = FormatError::DecodeFailed {
            detail: "not a zip archive".into(),
        };
        let env = e.envelope();
        assert_eq!(env.error, "Formatting failed");
        assert!(env.details.contains("not a zip archive"));
    }

    #[test]
    fn envelope_serialises_to_error_details_pair() {
        let env = FormatError::EmptyInput.envelope();
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("details").is_some());
    }

    #[test]
    fn rate_limit_classification() {
        assert!(ProviderError::RateLimited {
            message: "slow down".into()
        }
        .is_rate_limit());
        assert!(ProviderError::Api {
            message: "HTTP 429 from upstream".into()
        }
        .is_rate_limit());
        assert!(!ProviderError::AuthDenied {
            message: "bad key".into()
        }
        .is_rate_limit());
        assert!(!ProviderError::Api {
            message: "HTTP 500".into()
        }
        .is_rate_limit());
    }

    #[test]
    fn input_too_large_display() {
        let e = FormatError::InputTooLarge {
            size: 11 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        };
        assert!(e.to_string().contains("limit"));
    }
}
