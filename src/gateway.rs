//! Gateway facade: the single entry point for agent LLM turns.
//!
//! Resolves a credential (or takes a session-scoped override), invokes the
//! provider with retry and endpoint fallback, and feeds the outcome back
//! into the disable policy. The only component that raises caller-visible
//! typed errors.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::credentials::CredentialRegistry;
use crate::error::GatewayError;
use crate::invoker::Invoker;
use crate::providers::{profile_for, ChatRequest, ChatResponse};
use crate::telemetry::UsageSink;

/// The facade owning the registry, invoker, and telemetry sink.
pub struct Gateway {
    registry: Arc<CredentialRegistry>,
    invoker: Invoker,
    usage: Arc<dyn UsageSink>,
    request_delay: Duration,
}

impl Gateway {
    pub fn new(
        registry: Arc<CredentialRegistry>,
        invoker: Invoker,
        usage: Arc<dyn UsageSink>,
    ) -> Self {
        Self {
            registry,
            invoker,
            usage,
            request_delay: Duration::ZERO,
        }
    }

    /// Apply the configured pre-request delay and reconcile the master
    /// credential from `config`.
    pub async fn apply_config(mut self, config: &EngineConfig) -> Result<Self, GatewayError> {
        self.request_delay = config.request_delay;
        self.registry.reconcile_master(config.master.as_ref()).await?;
        Ok(self)
    }

    /// The registry backing this gateway, for the admin/UI layer.
    pub fn registry(&self) -> &Arc<CredentialRegistry> {
        &self.registry
    }

    /// Run one agent LLM turn.
    ///
    /// An explicit override credential bypasses selection but still routes
    /// through the invoker and failure recording. Otherwise the least
    /// recently used eligible credential is selected; none available is a
    /// hard failure, never a silent unauthenticated call.
    pub async fn get_response(&self, request: ChatRequest) -> Result<ChatResponse, GatewayError> {
        let credential = match &request.override_credential {
            Some(credential) => {
                tracing::debug!(
                    provider = %credential.provider,
                    secret = %credential.masked_secret(),
                    "using session-scoped override credential"
                );
                credential.clone()
            }
            None => self
                .registry
                .select_next(request.provider.as_deref(), request.model.as_deref())
                .await?
                .ok_or(GatewayError::NoCredentialAvailable)?,
        };

        let profile =
            profile_for(&credential.provider).ok_or_else(|| GatewayError::UnknownProvider {
                provider: credential.provider.clone(),
            })?;

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| credential.model.clone());

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        tracing::debug!(
            provider = %credential.provider,
            model = %model,
            messages = request.messages.len(),
            "dispatching provider request"
        );

        let response = self
            .invoker
            .invoke(
                &self.registry,
                profile,
                &credential,
                &model,
                request.system_prompt.as_deref(),
                &request.messages,
            )
            .await?;

        let tokens = estimated_tokens(&request, &response);
        if let Err(error) = self.usage.record_tokens(tokens).await {
            tracing::warn!(%error, "failed to record token usage");
        }

        Ok(response)
    }
}

/// Provider-reported totals when available, otherwise a character-count
/// estimate over the request and response text.
fn estimated_tokens(request: &ChatRequest, response: &ChatResponse) -> u64 {
    if let Some(usage) = &response.usage {
        return usage.total_tokens;
    }
    let request_chars: usize = request
        .messages
        .iter()
        .map(|m| m.content.len())
        .sum::<usize>()
        + request.system_prompt.as_deref().map_or(0, str::len);
    (request_chars + response.content.len()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, TokenUsage};

    #[test]
    fn estimate_prefers_provider_reported_usage() {
        let request = ChatRequest::new(vec![ChatMessage::user("hello")]);
        let response = ChatResponse {
            content: "world".to_string(),
            provider: "qwen".to_string(),
            model: "qwen-plus".to_string(),
            usage: Some(TokenUsage::new(10, 5)),
        };
        assert_eq!(estimated_tokens(&request, &response), 15);
    }

    #[test]
    fn estimate_falls_back_to_character_counts() {
        let request = ChatRequest::new(vec![ChatMessage::user("hello")])
            .with_system_prompt("sys");
        let response = ChatResponse {
            content: "world!".to_string(),
            provider: "qwen".to_string(),
            model: "qwen-plus".to_string(),
            usage: None,
        };
        // 5 message chars + 3 system chars + 6 response chars.
        assert_eq!(estimated_tokens(&request, &response), 14);
    }
}
