//! Engine configuration.
//!
//! Loaded once at process startup from environment variables and handed to
//! the components explicitly; nothing here is a global.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// The operator-configured fallback credential merged into the registry at
/// startup so the system always has at least one usable key.
#[derive(Debug, Clone)]
pub struct MasterCredential {
    pub provider: String,
    pub secret: String,
    pub model: String,
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory the credential registry file lives under.
    pub base_dir: PathBuf,
    /// Fallback credential, when the operator configured one.
    pub master: Option<MasterCredential>,
    /// Optional pause before each provider invocation.
    pub request_delay: Duration,
}

impl EngineConfig {
    /// Build a config from environment variables, rooted at `working_dir`.
    ///
    /// - `MASTER_LLM_API_KEY` (legacy `LLM_API_KEY`) - fallback key material
    /// - `MASTER_LLM_PROVIDER` (legacy `LLM_PROVIDER`) - defaults to `qwen`
    /// - `MASTER_LLM_MODEL` (legacy `LLM_MODEL_NAME`) - defaults to `qwen-plus`
    /// - `LLM_REQUEST_DELAY_MS` - defaults to 0
    pub fn from_env(working_dir: &Path) -> Self {
        let master_secret = env_nonempty("MASTER_LLM_API_KEY")
            .or_else(|| env_nonempty("LLM_API_KEY"));

        let master = master_secret.map(|secret| MasterCredential {
            provider: env_nonempty("MASTER_LLM_PROVIDER")
                .or_else(|| env_nonempty("LLM_PROVIDER"))
                .unwrap_or_else(|| "qwen".to_string()),
            secret,
            model: env_nonempty("MASTER_LLM_MODEL")
                .or_else(|| env_nonempty("LLM_MODEL_NAME"))
                .unwrap_or_else(|| "qwen-plus".to_string()),
        });

        let request_delay = std::env::var("LLM_REQUEST_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        Self {
            base_dir: working_dir.to_path_buf(),
            master,
            request_delay,
        }
    }

    /// Config with no master credential and no request delay.
    pub fn bare(working_dir: &Path) -> Self {
        Self {
            base_dir: working_dir.to_path_buf(),
            master: None,
            request_delay: Duration::ZERO,
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
