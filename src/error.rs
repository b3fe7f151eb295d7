//! Caller-visible error taxonomy.
//!
//! Only the gateway raises these; the classifier and disable policy record
//! expected failures instead of erroring. Messages never contain key
//! material, only masked previews at most.

use thiserror::Error;

/// Typed failure returned to the job/session layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No eligible credential matched the request. Terminal for this call;
    /// not retried internally.
    #[error("no eligible LLM credential available")]
    NoCredentialAvailable,

    /// The stored credential names a provider this build knows nothing
    /// about.
    #[error("no provider profile registered for '{provider}'")]
    UnknownProvider { provider: String },

    /// The provider rejected the credential itself. The credential has been
    /// disabled as a side effect.
    #[error("{provider} rejected the request; credential disabled")]
    PermanentCredentialFailure { provider: String },

    /// Every endpoint exhausted its retry budget. The credential's error
    /// counter has been incremented.
    #[error("{provider} unavailable after {attempts} attempts, try again later (last: {last_cause})")]
    TemporaryProviderFailure {
        provider: String,
        attempts: u32,
        last_cause: String,
    },

    /// Credential persistence failed inside the locked mutation path.
    #[error("credential store error: {0}")]
    Store(#[from] anyhow::Error),
}
