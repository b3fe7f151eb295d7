//! Failure classification: maps a provider HTTP response to a failure kind.

use serde::{Deserialize, Serialize};

/// What a provider failure means for the credential that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The credential itself is invalid, revoked, or exhausted for the
    /// billing period. Not retryable without operator intervention.
    Permanent,
    /// Expected to resolve itself (rate limit, transient 5xx). Eligible for
    /// retry and backoff.
    Temporary,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Permanent => write!(f, "permanent"),
            FailureKind::Temporary => write!(f, "temporary"),
        }
    }
}

/// One body-substring rule in a provider's marker table.
///
/// Patterns are matched case-insensitively against the response body and
/// must therefore be lowercase.
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub pattern: &'static str,
    pub kind: FailureKind,
}

impl Marker {
    pub const fn permanent(pattern: &'static str) -> Self {
        Self {
            pattern,
            kind: FailureKind::Permanent,
        }
    }

    pub const fn temporary(pattern: &'static str) -> Self {
        Self {
            pattern,
            kind: FailureKind::Temporary,
        }
    }
}

/// Quota-exhaustion markers that turn a 429 into a permanent failure for
/// the current billing period. Shared across providers. A bare "limit"
/// would also match the word "limited" in ordinary rate-limit messages,
/// so the limit markers carry their verb.
const QUOTA_MARKERS: &[&str] = &["quota", "exceeded", "limit reached", "limit exhausted"];

/// Classify a provider response. The shape is identical for every provider;
/// only the `markers` vocabulary differs.
///
/// Fails open toward retryability: anything not recognizably fatal is
/// temporary.
pub fn classify_response(status: u16, body: &str, markers: &[Marker]) -> FailureKind {
    let body_lower = body.to_lowercase();

    if status == 401 || status == 403 {
        return FailureKind::Permanent;
    }
    if status == 429 {
        if QUOTA_MARKERS.iter().any(|m| body_lower.contains(m)) {
            return FailureKind::Permanent;
        }
        return FailureKind::Temporary;
    }
    if status >= 500 {
        return FailureKind::Temporary;
    }
    if let Some(marker) = markers.iter().find(|m| body_lower.contains(m.pattern)) {
        return marker.kind;
    }
    FailureKind::Temporary
}
