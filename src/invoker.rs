//! Provider invocation: endpoint fallback, bounded retries, backoff.
//!
//! One logical request walks an ordered endpoint chain. Each endpoint gets
//! up to `max_retries` attempts with exponential backoff between them; each
//! attempt runs under its own hard timeout. Classified permanent failures
//! abort the whole invocation immediately - a credential the provider
//! rejects outright is rejected everywhere. Temporary failures burn retry
//! budget, then move on to the next endpoint. The registry lock is never
//! held across a network call.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};

use crate::credentials::{Credential, CredentialRegistry};
use crate::error::GatewayError;
use crate::providers::{ChatMessage, ChatResponse, FailureKind, ProviderProfile};

/// Retry and timeout knobs for provider invocations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per endpoint before moving to the next one.
    pub max_retries: u32,
    /// Backoff before the second attempt; doubles each retry.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Hard deadline for a single attempt, cancelling the in-flight call.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Backoff to apply before `attempt` (zero-based). The first attempt on
    /// an endpoint runs immediately.
    pub fn backoff_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some((self.initial_delay.saturating_mul(factor)).min(self.max_delay))
    }
}

/// A fully built provider HTTP request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Raw provider HTTP reply.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Network-level failure (connect, timeout, protocol). Always temporary.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Seam between the retry loop and the actual HTTP stack, so invocation
/// logic is testable without a live provider.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &ProviderRequest) -> Result<HttpReply, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ProviderRequest) -> Result<HttpReply, TransportError> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError(format!("request timeout: {e}"))
            } else if e.is_connect() {
                TransportError(format!("connection failed: {e}"))
            } else {
                TransportError(format!("request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpReply { status, body })
    }
}

/// Executes one logical request against a provider with endpoint fallback.
pub struct Invoker {
    transport: Arc<dyn HttpTransport>,
    retry: RetryConfig,
}

impl Invoker {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// Invoker using the production reqwest transport and default retries.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()), RetryConfig::default())
    }

    /// Run one logical chat request for `credential`.
    ///
    /// Success and failure are recorded against the registry before this
    /// returns; the caller only sees the final outcome.
    pub async fn invoke(
        &self,
        registry: &CredentialRegistry,
        profile: &dyn ProviderProfile,
        credential: &Credential,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, GatewayError> {
        let endpoints = candidate_endpoints(credential, profile);
        let body = profile.request_body(model, system_prompt, messages);
        let headers = build_headers(credential, profile);

        let mut attempts_total: u32 = 0;
        let mut last_cause = String::from("no attempt made");

        for (endpoint_index, url) in endpoints.iter().enumerate() {
            let request = ProviderRequest {
                url: url.clone(),
                headers: headers.clone(),
                body: body.clone(),
            };

            for attempt in 0..self.retry.max_retries {
                if let Some(delay) = self.retry.backoff_delay(attempt) {
                    tracing::debug!(?delay, attempt, url = %url, "backing off before retry");
                    sleep(delay).await;
                }
                attempts_total += 1;

                let reply = match timeout(
                    self.retry.attempt_timeout,
                    self.transport.execute(&request),
                )
                .await
                {
                    Err(_) => {
                        last_cause = format!(
                            "attempt timed out after {}s",
                            self.retry.attempt_timeout.as_secs()
                        );
                        tracing::warn!(url = %url, attempt, "provider attempt timed out");
                        continue;
                    }
                    Ok(Err(transport_error)) => {
                        last_cause = transport_error.to_string();
                        tracing::warn!(url = %url, attempt, error = %transport_error, "transport error");
                        continue;
                    }
                    Ok(Ok(reply)) => reply,
                };

                if (200..300).contains(&reply.status) {
                    let payload: Value =
                        serde_json::from_str(&reply.body).unwrap_or(Value::Null);
                    if let Some(content) = profile.extract_content(&payload) {
                        registry.record_success(credential).await?;
                        tracing::debug!(
                            provider = profile.name(),
                            attempts = attempts_total,
                            "provider call succeeded"
                        );
                        return Ok(ChatResponse {
                            content,
                            provider: credential.provider.clone(),
                            model: model.to_string(),
                            usage: profile.extract_usage(&payload),
                        });
                    }

                    // Semantically empty success: classify it like an HTTP
                    // error. The raw body is the classification input so
                    // markers in non-JSON replies still count.
                    match profile.classify(reply.status, &reply.body) {
                        FailureKind::Permanent => {
                            return self
                                .abort_permanent(registry, credential, "malformed response")
                                .await;
                        }
                        FailureKind::Temporary => {
                            last_cause =
                                format!("malformed response: {}", truncate(&reply.body));
                            tracing::warn!(url = %url, attempt, "empty or malformed provider payload");
                            continue;
                        }
                    }
                }

                match profile.classify(reply.status, &reply.body) {
                    FailureKind::Permanent => {
                        return self
                            .abort_permanent(
                                registry,
                                credential,
                                &format!("status {}", reply.status),
                            )
                            .await;
                    }
                    FailureKind::Temporary => {
                        last_cause =
                            format!("status {}: {}", reply.status, truncate(&reply.body));
                        tracing::warn!(
                            url = %url,
                            attempt,
                            status = reply.status,
                            "temporary provider failure"
                        );
                        continue;
                    }
                }
            }

            if endpoint_index + 1 < endpoints.len() {
                tracing::warn!(
                    url = %url,
                    "endpoint exhausted its retry budget, trying next endpoint"
                );
            }
        }

        // Every endpoint exhausted: one temporary failure for the whole
        // invocation, not one per attempt.
        registry
            .record_failure(credential, FailureKind::Temporary)
            .await?;
        tracing::error!(
            provider = profile.name(),
            attempts = attempts_total,
            last_cause = %last_cause,
            "provider invocation exhausted all endpoints"
        );
        Err(GatewayError::TemporaryProviderFailure {
            provider: credential.provider.clone(),
            attempts: attempts_total,
            last_cause,
        })
    }

    async fn abort_permanent(
        &self,
        registry: &CredentialRegistry,
        credential: &Credential,
        cause: &str,
    ) -> Result<ChatResponse, GatewayError> {
        tracing::error!(
            provider = %credential.provider,
            secret = %credential.masked_secret(),
            cause,
            "permanent credential failure, aborting invocation"
        );
        registry
            .record_failure(credential, FailureKind::Permanent)
            .await?;
        Err(GatewayError::PermanentCredentialFailure {
            provider: credential.provider.clone(),
        })
    }
}

/// Candidate endpoints: the credential's explicit override first, then the
/// provider's fixed fallback chain, without repeating the override.
fn candidate_endpoints(credential: &Credential, profile: &dyn ProviderProfile) -> Vec<String> {
    let mut endpoints = Vec::new();
    if let Some(base_url) = &credential.base_url {
        endpoints.push(base_url.clone());
    }
    for url in profile.fallback_endpoints() {
        if credential.base_url.as_deref() != Some(*url) {
            endpoints.push((*url).to_string());
        }
    }
    endpoints
}

fn build_headers(credential: &Credential, profile: &dyn ProviderProfile) -> Vec<(String, String)> {
    let mut headers = vec![(
        "Authorization".to_string(),
        format!("Bearer {}", credential.secret),
    )];
    for (name, value) in profile.extra_headers() {
        headers.push((name.to_string(), value));
    }
    headers
}

/// Keep error causes short enough for logs and error messages.
fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{head}…")
    }
}
