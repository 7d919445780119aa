//! Error classification for generative-endpoint failures.
//!
//! The detection logic matches status codes and error patterns in API
//! response bodies to identify quota exhaustion, rate limiting, server
//! overload, and auth failures, so callers can decide whether a retry can
//! ever help.

use crate::error::GenAiError;

/// Classify a non-success response into the error taxonomy.
pub fn classify_failure(status: u16, body: &str) -> GenAiError {
    let lowered = body.to_lowercase();

    if status == 429
        || lowered.contains("rate limit")
        || lowered.contains("rate_limit")
        || lowered.contains("too many requests")
    {
        return GenAiError::RateLimited(compact_reason(body, "request rate too high"));
    }

    if lowered.contains("quota")
        || lowered.contains("resource_exhausted")
        || (lowered.contains("billing") && lowered.contains("limit"))
    {
        return GenAiError::QuotaExceeded(compact_reason(body, "quota limit reached"));
    }

    if status == 503 || lowered.contains("overloaded") || lowered.contains("service unavailable") {
        return GenAiError::Overloaded(compact_reason(body, "service unavailable"));
    }

    if status == 401
        || status == 403
        || lowered.contains("invalid api key")
        || lowered.contains("api_key_invalid")
        || lowered.contains("unauthorized")
    {
        return GenAiError::AuthFailed(compact_reason(body, "credentials rejected"));
    }

    GenAiError::Http {
        status,
        message: compact_reason(body, "request failed"),
    }
}

/// Collapse an error body to a single line, falling back when it is empty.
fn compact_reason(body: &str, fallback: &str) -> String {
    let compact = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if compact.is_empty() {
        fallback.to_string()
    } else {
        compact
    }
}
