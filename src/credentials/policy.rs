//! Disable policy: error counters, cooldown windows, permanent suspension.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::Credential;
use crate::providers::FailureKind;

/// Thresholds driving temporary and permanent credential suspension.
#[derive(Debug, Clone)]
pub struct DisableRules {
    /// Consecutive temporary failures before a cooldown kicks in.
    pub max_temp_errors: u32,
    /// How long a credential stays ineligible after hitting the threshold.
    pub cooldown: Duration,
}

impl Default for DisableRules {
    fn default() -> Self {
        Self {
            max_temp_errors: 8,
            cooldown: Duration::from_secs(5 * 60),
        }
    }
}

impl DisableRules {
    /// Clear all failure state after a genuine success.
    pub fn record_success(&self, credential: &mut Credential) {
        credential.error_count = 0;
        credential.disabled_until = None;
        credential.permanently_disabled = false;
    }

    /// Apply a classified failure to the credential's counters.
    ///
    /// Permanent failures suspend the credential until an explicit reset.
    /// Temporary failures increment the counter; crossing the threshold
    /// clears it and opens a cooldown window instead.
    pub fn record_failure(
        &self,
        credential: &mut Credential,
        kind: FailureKind,
        now: DateTime<Utc>,
    ) {
        match kind {
            FailureKind::Permanent => {
                credential.permanently_disabled = true;
                credential.error_count = 0;
                credential.disabled_until = None;
                tracing::error!(
                    provider = %credential.provider,
                    secret = %credential.masked_secret(),
                    "credential permanently disabled"
                );
            }
            FailureKind::Temporary => {
                credential.error_count += 1;
                if credential.error_count >= self.max_temp_errors {
                    credential.disabled_until = Some(now + self.cooldown_chrono());
                    credential.error_count = 0;
                    tracing::warn!(
                        provider = %credential.provider,
                        secret = %credential.masked_secret(),
                        cooldown_secs = self.cooldown.as_secs(),
                        "credential temporarily disabled after repeated errors"
                    );
                } else {
                    tracing::warn!(
                        provider = %credential.provider,
                        secret = %credential.masked_secret(),
                        error_count = credential.error_count,
                        "credential temporary error count incremented"
                    );
                }
            }
        }
    }

    /// Unconditionally rehabilitate a credential.
    pub fn reset(&self, credential: &mut Credential) {
        credential.error_count = 0;
        credential.disabled_until = None;
        credential.permanently_disabled = false;
    }

    fn cooldown_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.cooldown)
            .unwrap_or_else(|_| chrono::Duration::seconds(5 * 60))
    }
}
