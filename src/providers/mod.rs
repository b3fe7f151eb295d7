//! Provider profiles and chat types.
//!
//! A [`ProviderProfile`] is the capability interface one LLM provider
//! implements: its fallback endpoint chain, its failure-marker vocabulary,
//! and the minimal wire shape needed to send a chat request and pull the
//! text content back out. Nothing here goes beyond what classification and
//! content extraction require.

mod classify;
mod profiles;

pub use classify::{classify_response, FailureKind, Marker};
pub use profiles::profile_for;

use serde::{Deserialize, Serialize};

use crate::credentials::Credential;

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One logical request handed to the gateway.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Restrict credential selection to this provider.
    pub provider: Option<String>,
    /// Restrict credential selection to this model; also overrides the
    /// credential's default model for the call.
    pub model: Option<String>,
    /// Prepended as a system message when present.
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Session-scoped credential override; bypasses selection but still
    /// flows through failure recording.
    pub override_credential: Option<Credential>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_override_credential(mut self, credential: Credential) -> Self {
        self.override_credential = Some(credential);
        self
    }
}

/// Parsed result of a successful provider call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    /// Token usage when the provider reports it.
    pub usage: Option<TokenUsage>,
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Capability interface implemented once per provider.
pub trait ProviderProfile: Send + Sync {
    /// Provider identifier matching `Credential::provider`.
    fn name(&self) -> &'static str;

    /// Known endpoints in fixed priority order, tried after any explicit
    /// `base_url` on the credential.
    fn fallback_endpoints(&self) -> &'static [&'static str];

    /// Body-marker vocabulary for failure classification.
    fn markers(&self) -> &'static [Marker];

    /// Classify a provider HTTP response.
    fn classify(&self, status: u16, body: &str) -> FailureKind {
        classify_response(status, body, self.markers())
    }

    /// Extra request headers beyond authorization.
    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Build the request body for a chat call.
    fn request_body(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> serde_json::Value;

    /// Pull the response text out of a 2xx payload. `None` means the
    /// response was semantically empty and is routed through classification.
    fn extract_content(&self, payload: &serde_json::Value) -> Option<String>;

    /// Pull token usage out of a 2xx payload, when reported.
    ///
    /// Default covers the OpenAI-compatible `usage` object.
    fn extract_usage(&self, payload: &serde_json::Value) -> Option<TokenUsage> {
        let usage = payload.get("usage")?;
        Some(TokenUsage::new(
            usage.get("prompt_tokens")?.as_u64()?,
            usage.get("completion_tokens")?.as_u64()?,
        ))
    }
}
