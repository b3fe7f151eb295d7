//! Shared test fixtures: a scripted HTTP transport and registry helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use keyrotor::invoker::{HttpReply, ProviderRequest, TransportError};
use keyrotor::{
    Credential, CredentialRegistry, CredentialStore, DisableRules, FileCredentialStore,
    HttpTransport, RetryConfig,
};

/// One scripted reply for a stubbed endpoint.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// HTTP response with the given status and body.
    Http(u16, &'static str),
    /// Transport-level failure (connect error and friends).
    Transport(&'static str),
    /// Sleep long enough to trip the attempt timeout, then succeed.
    Hang,
}

struct Endpoint {
    replies: Vec<StubReply>,
    served: AtomicUsize,
}

/// Transport stub that serves scripted replies per URL, repeating the last
/// reply once a script runs out. Records every attempt in order.
#[derive(Default)]
pub struct ScriptedTransport {
    endpoints: Mutex<HashMap<String, Endpoint>>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the replies for `url`.
    pub fn script(&self, url: &str, replies: Vec<StubReply>) {
        assert!(!replies.is_empty(), "script needs at least one reply");
        self.endpoints.lock().unwrap().insert(
            url.to_string(),
            Endpoint {
                replies,
                served: AtomicUsize::new(0),
            },
        );
    }

    /// Every attempted URL, in call order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn next_reply(&self, url: &str) -> StubReply {
        let endpoints = self.endpoints.lock().unwrap();
        let endpoint = endpoints
            .get(url)
            .unwrap_or_else(|| panic!("no script for {url}"));
        let index = endpoint.served.fetch_add(1, Ordering::SeqCst);
        endpoint
            .replies
            .get(index)
            .or_else(|| endpoint.replies.last())
            .cloned()
            .unwrap()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: &ProviderRequest) -> Result<HttpReply, TransportError> {
        self.attempts.lock().unwrap().push(request.url.clone());
        match self.next_reply(&request.url) {
            StubReply::Http(status, body) => Ok(HttpReply {
                status,
                body: body.to_string(),
            }),
            StubReply::Transport(message) => Err(TransportError(message.to_string())),
            StubReply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(HttpReply {
                    status: 200,
                    body: String::new(),
                })
            }
        }
    }
}

/// Retry config with millisecond backoff so scenario tests stay fast.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        attempt_timeout: Duration::from_millis(250),
    }
}

/// Open a file-backed registry seeded with `credentials`.
pub async fn seeded_registry(
    dir: &std::path::Path,
    credentials: Vec<Credential>,
) -> CredentialRegistry {
    let store = FileCredentialStore::new(dir);
    store.replace_all(&credentials).await.unwrap();
    CredentialRegistry::open(Box::new(store), DisableRules::default())
        .await
        .unwrap()
}

/// A minimal OpenAI-style success body.
pub const OPENAI_OK: &str = r#"{"choices":[{"message":{"content":"all good"}}]}"#;
