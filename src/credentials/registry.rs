//! The credential registry: shared mutable state behind a single writer.
//!
//! Every mutation (selection, success/failure recording, admin edits,
//! deduplication, master-credential reconciliation) takes the write lock,
//! applies the change to the in-memory list, and persists the full list
//! before the lock is released. Concurrent agent executions therefore never
//! clobber each other's updates. Read-only listing takes the read lock and
//! never blocks on persistence. Network calls happen outside this module
//! and never hold the lock.

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::RwLock;

use super::store::{dedupe, CredentialStore};
use super::{Credential, CredentialInfo, DisableRules};
use crate::config::MasterCredential;
use crate::providers::FailureKind;

/// Result of merging the configured master credential into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The master credential was inserted at the front of the registry.
    Added,
    /// An existing entry was rehabilitated and moved to the front.
    Updated,
    /// No master credential is configured.
    Ignored,
}

/// Shared, persistent credential collection with single-writer discipline.
pub struct CredentialRegistry {
    store: Box<dyn CredentialStore>,
    rules: DisableRules,
    credentials: RwLock<Vec<Credential>>,
}

impl CredentialRegistry {
    /// Load the registry from its store, deduplicating on the way in.
    ///
    /// Duplicates detected at load time are dropped (first occurrence wins)
    /// and the cleaned list is persisted immediately.
    pub async fn open(store: Box<dyn CredentialStore>, rules: DisableRules) -> Result<Self> {
        let loaded = store.load_all().await.context("loading credentials")?;
        let (unique, removed) = dedupe(loaded);
        if removed > 0 {
            store
                .replace_all(&unique)
                .await
                .context("persisting deduplicated credentials")?;
        }
        tracing::info!(count = unique.len(), "credential registry loaded");
        Ok(Self {
            store,
            rules,
            credentials: RwLock::new(unique),
        })
    }

    /// Pick the next eligible credential for the given filters.
    ///
    /// Eligible credentials are visited least-recently-used first. The
    /// chosen credential's `last_used` is stamped and persisted before this
    /// returns, so a concurrent caller sees the update and picks someone
    /// else. `Ok(None)` means nothing is eligible right now.
    pub async fn select_next(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<Option<Credential>> {
        let now = Utc::now();
        let mut credentials = self.credentials.write().await;

        let pick = credentials
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.is_eligible(now)
                    && provider.map_or(true, |p| c.provider == p)
                    && model.map_or(true, |m| c.model == m)
            })
            .min_by_key(|(_, c)| c.last_used)
            .map(|(index, _)| index);

        let Some(index) = pick else {
            tracing::warn!(?provider, ?model, "no eligible credential available");
            return Ok(None);
        };

        credentials[index].last_used = Some(now);
        self.persist(&credentials).await?;

        let chosen = credentials[index].clone();
        tracing::debug!(
            provider = %chosen.provider,
            secret = %chosen.masked_secret(),
            model = %chosen.model,
            "selected credential"
        );
        Ok(Some(chosen))
    }

    /// Record a genuine success for `credential`, clearing its failure state.
    ///
    /// No-op when the credential is not in the registry (e.g. a
    /// session-scoped override).
    pub async fn record_success(&self, credential: &Credential) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        let Some(found) = Self::find_mut(&mut credentials, credential) else {
            return Ok(());
        };
        self.rules.record_success(found);
        self.persist(&credentials).await
    }

    /// Record a classified failure for `credential`.
    ///
    /// No-op when the credential is not in the registry.
    pub async fn record_failure(&self, credential: &Credential, kind: FailureKind) -> Result<()> {
        let now = Utc::now();
        let mut credentials = self.credentials.write().await;
        let Some(found) = Self::find_mut(&mut credentials, credential) else {
            return Ok(());
        };
        self.rules.record_failure(found, kind, now);
        self.persist(&credentials).await
    }

    /// Rehabilitate the credential matching `provider` + `secret`.
    ///
    /// Returns whether a matching credential was found.
    pub async fn reset_status(&self, provider: &str, secret: &str) -> Result<bool> {
        let mut credentials = self.credentials.write().await;
        let Some(found) = credentials
            .iter_mut()
            .find(|c| c.provider == provider && c.secret == secret)
        else {
            return Ok(false);
        };
        self.rules.reset(found);
        tracing::info!(provider, secret = %found.masked_secret(), "credential status reset");
        self.persist(&credentials).await?;
        Ok(true)
    }

    /// Append a new credential to the registry.
    pub async fn add(&self, credential: Credential) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        tracing::info!(
            provider = %credential.provider,
            secret = %credential.masked_secret(),
            model = %credential.model,
            "credential added"
        );
        credentials.push(credential);
        self.persist(&credentials).await
    }

    /// Remove the credential at `index`, returning it.
    pub async fn remove(&self, index: usize) -> Result<Credential> {
        let mut credentials = self.credentials.write().await;
        if index >= credentials.len() {
            anyhow::bail!(
                "credential index {index} out of bounds ({} entries)",
                credentials.len()
            );
        }
        let removed = credentials.remove(index);
        tracing::info!(
            provider = %removed.provider,
            secret = %removed.masked_secret(),
            "credential removed"
        );
        self.persist(&credentials).await?;
        Ok(removed)
    }

    /// Masked snapshot of every credential, for the admin/UI layer.
    ///
    /// Read-only; does not take the write lock.
    pub async fn list(&self) -> Vec<CredentialInfo> {
        let credentials = self.credentials.read().await;
        credentials.iter().map(CredentialInfo::from).collect()
    }

    /// Whether any eligible credential exists for `provider` right now.
    pub async fn has_available(&self, provider: &str) -> bool {
        let now = Utc::now();
        let credentials = self.credentials.read().await;
        credentials
            .iter()
            .any(|c| c.provider == provider && c.is_eligible(now))
    }

    /// Run deduplication on demand, persisting only when something changed.
    pub async fn dedupe_now(&self) -> Result<usize> {
        let mut credentials = self.credentials.write().await;
        let (unique, removed) = dedupe(std::mem::take(&mut *credentials));
        *credentials = unique;
        if removed > 0 {
            self.persist(&credentials).await?;
        }
        Ok(removed)
    }

    /// Merge the externally configured master credential into the registry.
    ///
    /// Guarantees an operator-configured fallback key is always present,
    /// enabled, and at the front of the store order.
    pub async fn reconcile_master(
        &self,
        master: Option<&MasterCredential>,
    ) -> Result<ReconcileOutcome> {
        let Some(master) = master.filter(|m| !m.secret.trim().is_empty()) else {
            return Ok(ReconcileOutcome::Ignored);
        };

        let now = Utc::now();
        let candidate = Credential::new(
            master.provider.clone(),
            master.secret.clone(),
            master.model.clone(),
            None,
        );

        let mut credentials = self.credentials.write().await;
        let existing = credentials.iter().position(|c| c.same_identity(&candidate));

        let outcome = match existing {
            Some(index) => {
                let mut entry = credentials.remove(index);
                if !entry.is_eligible(now) || entry.error_count > 0 {
                    self.rules.reset(&mut entry);
                }
                entry.last_used = Some(now);
                credentials.insert(0, entry);
                tracing::info!(
                    provider = %master.provider,
                    "master credential rehabilitated and moved to front"
                );
                ReconcileOutcome::Updated
            }
            None => {
                let mut entry = candidate;
                entry.last_used = Some(now);
                credentials.insert(0, entry);
                tracing::info!(
                    provider = %master.provider,
                    "master credential added at front"
                );
                ReconcileOutcome::Added
            }
        };

        self.persist(&credentials).await?;
        Ok(outcome)
    }

    fn find_mut<'a>(
        credentials: &'a mut [Credential],
        target: &Credential,
    ) -> Option<&'a mut Credential> {
        credentials
            .iter_mut()
            .find(|c| c.provider == target.provider && c.secret == target.secret)
    }

    async fn persist(&self, credentials: &[Credential]) -> Result<()> {
        self.store
            .replace_all(credentials)
            .await
            .context("persisting credential registry")
    }
}
