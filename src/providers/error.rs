//! The closed provider error taxonomy and HTTP classification rules.
//!
//! Every failure an adapter can produce is one of the six [`ProviderError`]
//! kinds.  The manager never sees a vendor exception or a raw HTTP status —
//! classification happens here, at the adapter boundary, and the manager
//! only interprets the kind.

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Errors that can occur during a provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// HTTP 401 or a vendor-specific invalid-key signal.  The credential is
    /// wrong; the provider is sidelined for the rest of the session.
    #[error("invalid credentials: {0}")]
    InvalidAuth(String),

    /// Daily quota or credits exhausted (HTTP 403 with a quota keyword).
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Vendor error text.
        message: String,
        /// Vendor-supplied hint for when the quota resets, when present.
        reset_hint: Option<Duration>,
    },

    /// Too many requests (HTTP 429, or 403 mentioning rate limits).
    #[error("rate limited: {message}")]
    RateLimited {
        /// Vendor error text.
        message: String,
        /// `retry-after` hint, when the vendor sent one.
        retry_after: Option<Duration>,
    },

    /// Network, DNS, TLS failure, or timeout.  Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Server error, unparseable body, or 2xx with no usable text content.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// A 4xx that signals a broken request (bad request, method not
    /// allowed).  The provider is sidelined for the session — this is a
    /// misconfiguration, not a transient condition.
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// `true` for the one kind the adapter-local retry loop may retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            ProviderError::Transport(e.to_string())
        } else if e.is_decode() {
            ProviderError::BadResponse(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP status classification
// ---------------------------------------------------------------------------

/// Body keywords that mark an HTTP 403 as quota exhaustion.
const QUOTA_KEYWORDS: [&str; 3] = ["quota", "credits", "exhausted"];

/// Classify a non-2xx HTTP response into the error taxonomy.
///
/// * `status` — the HTTP status code.
/// * `body` — the response body text (vendor error messages live here).
/// * `retry_after` — the parsed `retry-after` header, when present.
///
/// The rules, in order: 401 is an auth failure; 429 is a rate limit; 403 is
/// quota exhaustion when the body names it, a rate limit when the body
/// mentions "rate", otherwise fatal; any other 4xx is fatal; everything else
/// (5xx) is a bad response.
pub fn classify_status(
    status: reqwest::StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> ProviderError {
    let message = extract_error_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status.as_u16() {
        401 => ProviderError::InvalidAuth(message),
        429 => ProviderError::RateLimited {
            message,
            retry_after,
        },
        403 => {
            let lower = body.to_lowercase();
            if QUOTA_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                ProviderError::QuotaExceeded {
                    message,
                    reset_hint: retry_after,
                }
            } else if lower.contains("rate") {
                ProviderError::RateLimited {
                    message,
                    retry_after,
                }
            } else {
                ProviderError::Fatal(message)
            }
        }
        400..=499 => ProviderError::Fatal(message),
        _ => ProviderError::BadResponse(message),
    }
}

/// Pull the human-readable message out of a vendor error body.
///
/// Both the OpenAI-shaped providers and Gemini nest it under
/// `{"error": {"message": ...}}`; Ollama uses a flat `{"error": ...}`.
/// Falls back to `None` when the body is not JSON or has no message.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(msg) = value["error"]["message"].as_str() {
        return Some(msg.to_string());
    }
    if let Some(msg) = value["error"].as_str() {
        return Some(msg.to_string());
    }
    None
}

/// Parse a `retry-after` header value (whole seconds form only).
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
