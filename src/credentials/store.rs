//! Persistent credential storage.
//!
//! Credentials live in a single JSON registry file that is rewritten whole
//! on every mutation. Callers read-modify-write the entire list under the
//! registry's single-writer lock; this module only moves bytes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::Credential;

/// Fixed registry name the credential list is stored under.
const REGISTRY_NAME: &str = "llm-api-credentials";

/// Bulk persistence contract for the credential list.
///
/// Replacement is a full overwrite, not a diff. Persistence failures are
/// surfaced to the caller, never swallowed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the full ordered credential list.
    async fn load_all(&self) -> Result<Vec<Credential>>;

    /// Overwrite the stored list with `credentials`.
    async fn replace_all(&self, credentials: &[Credential]) -> Result<()>;
}

/// On-disk registry file layout.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    name: String,
    credentials: Vec<Credential>,
    updated_at: DateTime<Utc>,
}

/// JSON-file backed credential store.
///
/// The registry lives at `{base_dir}/.keyrotor/credentials.json`. A missing
/// file reads as an empty list; a corrupt file is an error.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store rooted at `base_dir`.
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: base_dir.join(".keyrotor").join("credentials.json"),
        }
    }

    /// Path of the backing registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_all(&self) -> Result<Vec<Credential>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let registry: RegistryFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(registry.credentials)
    }

    async fn replace_all(&self, credentials: &[Credential]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let registry = RegistryFile {
            name: REGISTRY_NAME.to_string(),
            credentials: credentials.to_vec(),
            updated_at: Utc::now(),
        };
        let content =
            serde_json::to_string_pretty(&registry).context("failed to serialize registry")?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tracing::debug!(
            count = credentials.len(),
            path = %self.path.display(),
            "persisted credential registry"
        );
        Ok(())
    }
}

/// Remove duplicate credentials, keeping the first occurrence per identity.
///
/// Returns the surviving list and the number of records discarded.
pub fn dedupe(credentials: Vec<Credential>) -> (Vec<Credential>, usize) {
    let mut seen = HashSet::new();
    let before = credentials.len();
    let unique: Vec<Credential> = credentials
        .into_iter()
        .filter(|c| seen.insert(c.identity()))
        .collect();
    let removed = before - unique.len();
    if removed > 0 {
        tracing::info!(removed, "removed duplicate credentials");
    }
    (unique, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_as_empty_list() {
        let temp = tempdir().unwrap();
        let store = FileCredentialStore::new(temp.path());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_then_load_roundtrips() {
        let temp = tempdir().unwrap();
        let store = FileCredentialStore::new(temp.path());

        let creds = vec![
            Credential::new("qwen", "sk-qwen-0123456789", "qwen-plus", None),
            Credential::new(
                "openai",
                "sk-openai-0123456789",
                "gpt-4o",
                Some("https://proxy.example.com/v1".to_string()),
            ),
        ];
        store.replace_all(&creds).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, creds);
    }

    #[tokio::test]
    async fn replace_is_a_full_overwrite() {
        let temp = tempdir().unwrap();
        let store = FileCredentialStore::new(temp.path());

        let first = vec![Credential::new("qwen", "sk-a-0123456789", "qwen-plus", None)];
        store.replace_all(&first).await.unwrap();

        let second = vec![Credential::new("grok", "sk-b-0123456789", "grok-2", None)];
        store.replace_all(&second).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let temp = tempdir().unwrap();
        let store = FileCredentialStore::new(temp.path());
        fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        fs::write(store.path(), "not json").await.unwrap();
        assert!(store.load_all().await.is_err());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let a = Credential::new("qwen", "sk-a-0123456789", "qwen-plus", None);
        let mut a_used = a.clone();
        a_used.error_count = 3;
        let b = Credential::new("qwen", "sk-b-0123456789", "qwen-plus", None);

        let (unique, removed) = dedupe(vec![a.clone(), b.clone(), a_used]);
        assert_eq!(removed, 1);
        assert_eq!(unique, vec![a, b]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let a = Credential::new("qwen", "sk-a-0123456789", "qwen-plus", None);
        let (unique, removed) = dedupe(vec![a.clone(), a.clone(), a]);
        assert_eq!(removed, 2);

        let (again, removed_again) = dedupe(unique);
        assert_eq!(removed_again, 0);
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn same_secret_different_model_is_not_a_duplicate() {
        let a = Credential::new("openai", "sk-a-0123456789", "gpt-4o", None);
        let b = Credential::new("openai", "sk-a-0123456789", "gpt-4o-mini", None);
        let (unique, removed) = dedupe(vec![a, b]);
        assert_eq!(removed, 0);
        assert_eq!(unique.len(), 2);
    }
}
