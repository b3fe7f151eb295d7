//! Best-effort usage telemetry and tracing bootstrap.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Destination for token-usage counters.
///
/// Strictly best-effort: the gateway logs sink failures and moves on. A
/// broken telemetry backend must never fail an otherwise successful call.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record_tokens(&self, count: u64) -> anyhow::Result<()>;
}

/// Process-local token counter. Host processes wanting durable counters
/// (a leaderboard, billing) implement [`UsageSink`] over their own store.
#[derive(Debug, Default)]
pub struct InMemoryUsage {
    total: AtomicU64,
}

impl InMemoryUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total tokens recorded so far.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UsageSink for InMemoryUsage {
    async fn record_tokens(&self, count: u64) -> anyhow::Result<()> {
        self.total.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }
}

/// Install a `tracing` subscriber with env-filter support.
///
/// Intended for host binaries and examples; safe to call more than once.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keyrotor=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_accumulates() {
        let sink = InMemoryUsage::new();
        sink.record_tokens(40).await.unwrap();
        sink.record_tokens(2).await.unwrap();
        assert_eq!(sink.total(), 42);
    }
}
