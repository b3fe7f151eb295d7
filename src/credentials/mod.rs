//! Credential records and their health state.
//!
//! A [`Credential`] is one provider API key plus the metadata needed to use
//! it (default model, optional endpoint override) and the counters that
//! drive rotation: consecutive temporary errors, cooldown window, permanent
//! disable flag, and the last-used timestamp for fairness ordering.

mod policy;
mod registry;
mod store;

pub use policy::DisableRules;
pub use registry::{CredentialRegistry, ReconcileOutcome};
pub use store::{dedupe, CredentialStore, FileCredentialStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One provider API key with its rotation state.
///
/// Identity is the `(provider, secret, model, base_url)` tuple; the registry
/// never holds two records with the same identity.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Provider identifier, e.g. `"qwen"` or `"openai"`.
    pub provider: String,
    /// Opaque key material. Never logged in full.
    pub secret: String,
    /// Default model used with this credential.
    pub model: String,
    /// Endpoint override; `None` means the provider's default chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Consecutive temporary failures since the last success or reset.
    #[serde(default)]
    pub error_count: u32,
    /// Temporarily ineligible while `now` is before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_until: Option<DateTime<Utc>>,
    /// Terminal until an explicit reset.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub permanently_disabled: bool,
    /// Updated on every selection; absent sorts first (highest priority).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a fresh, fully enabled credential.
    pub fn new(
        provider: impl Into<String>,
        secret: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            secret: secret.into(),
            model: model.into(),
            base_url,
            error_count: 0,
            disabled_until: None,
            permanently_disabled: false,
            last_used: None,
        }
    }

    /// Whether this credential may be handed out right now.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        !self.permanently_disabled
            && self.disabled_until.map_or(true, |until| now >= until)
    }

    /// Whether `other` refers to the same underlying key.
    pub fn same_identity(&self, other: &Credential) -> bool {
        self.provider == other.provider
            && self.secret == other.secret
            && self.model == other.model
            && self.base_url == other.base_url
    }

    /// Identity tuple used for deduplication.
    pub(crate) fn identity(&self) -> (String, String, String, Option<String>) {
        (
            self.provider.clone(),
            self.secret.clone(),
            self.model.clone(),
            self.base_url.clone(),
        )
    }

    /// Masked preview of the secret, safe for logs and listings.
    pub fn masked_secret(&self) -> String {
        mask_secret(&self.secret)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("secret", &self.masked_secret())
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("error_count", &self.error_count)
            .field("disabled_until", &self.disabled_until)
            .field("permanently_disabled", &self.permanently_disabled)
            .field("last_used", &self.last_used)
            .finish()
    }
}

/// Masked view of a credential returned to the admin/UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInfo {
    pub provider: String,
    pub secret_preview: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub error_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_until: Option<DateTime<Utc>>,
    pub permanently_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl From<&Credential> for CredentialInfo {
    fn from(c: &Credential) -> Self {
        Self {
            provider: c.provider.clone(),
            secret_preview: c.masked_secret(),
            model: c.model.clone(),
            base_url: c.base_url.clone(),
            error_count: c.error_count,
            disabled_until: c.disabled_until,
            permanently_disabled: c.permanently_disabled,
            last_used: c.last_used,
        }
    }
}

/// Mask key material down to a short preview: first four and last four
/// characters. Secrets too short for a meaningful preview are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
