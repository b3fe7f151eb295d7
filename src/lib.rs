//! # keyrotor
//!
//! Credential rotation and request failover engine for LLM providers.
//!
//! This library holds a pool of third-party API credentials, picks which
//! one to use per request, classifies provider failures, disables and
//! rehabilitates credentials over time, and drives multi-endpoint retry
//! with backoff when a provider call fails.
//!
//! ## Architecture
//!
//! ```text
//!  caller (agent turn)
//!        │
//!        ▼
//!  ┌───────────┐   select    ┌────────────────────┐
//!  │  Gateway  │────────────▶│ CredentialRegistry │  single-writer lock,
//!  └─────┬─────┘             │  (store + policy)  │  whole-list persist
//!        │                   └────────────────────┘
//!        ▼                            ▲
//!  ┌───────────┐  classify   ┌────────┴─────────┐
//!  │  Invoker  │────────────▶│ record success / │
//!  │ (retries, │             │ classified fail  │
//!  │ endpoints)│             └──────────────────┘
//!  └───────────┘
//! ```
//!
//! The network call never holds the registry lock; only selection and the
//! success/failure write-back do.
//!
//! ## Modules
//! - `credentials`: credential records, persistence, disable policy, the
//!   locked registry
//! - `providers`: per-provider profiles (endpoints, failure markers, wire
//!   shape) and chat types
//! - `invoker`: endpoint fallback, bounded retries, exponential backoff
//! - `gateway`: the facade callers use
//! - `telemetry`: best-effort usage counters and tracing bootstrap

pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod invoker;
pub mod providers;
pub mod telemetry;

pub use config::{EngineConfig, MasterCredential};
pub use credentials::{
    Credential, CredentialInfo, CredentialRegistry, CredentialStore, DisableRules,
    FileCredentialStore, ReconcileOutcome,
};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use invoker::{HttpTransport, Invoker, ReqwestTransport, RetryConfig};
pub use providers::{
    profile_for, ChatMessage, ChatRequest, ChatResponse, FailureKind, ProviderProfile, Role,
    TokenUsage,
};
pub use telemetry::{init_tracing, InMemoryUsage, UsageSink};
