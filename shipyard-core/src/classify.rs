//! Failure classification
//!
//! Decides whether a failure is transient (worth retrying) from its text.
//! This is a substring heuristic, not a structured error-code check.

use std::fmt::Display;

/// Case-sensitive substrings marking a failure as transient
pub const RECOVERABLE_KEYWORDS: [&str; 5] = ["network", "timeout", "rate limit", "auth", "token"];

/// Whether a failure described by `message` should be retried
pub fn is_recoverable(message: &str) -> bool {
    RECOVERABLE_KEYWORDS
        .iter()
        .any(|keyword| message.contains(keyword))
}

/// Classify any displayable error by its rendered text
pub fn classify(error: &dyn Display) -> bool {
    is_recoverable(&error.to_string())
}
