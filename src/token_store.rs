//! Persistence hooks for rotated OAuth tokens.
//!
//! `TokenManager` calls [`TokenStore::persist`] after every successful refresh
//! so the host decides where the new pair lives. Nothing here is durable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::models::Credentials;

pub trait TokenStore: Send + Sync {
    fn persist(&self, credentials: &Credentials) -> anyhow::Result<()>;
}

/// Writes the rotated pair back into the process environment so later
/// `std::env::var` reads see it.
///
/// Opt-in only (`AMOCRM_MIRROR_TOKENS_TO_ENV`). `std::env::set_var` is not
/// synchronised with C-level environment reads on other threads (glibc
/// `getaddrinfo` in the resolver, for one), so on Unix a refresh racing a DNS
/// lookup is undefined behaviour. Prefer [`MemoryTokenStore`] for sharing the
/// live pair inside the process.
#[derive(Debug, Clone)]
pub struct EnvTokenStore {
    access_var: String,
    refresh_var: String,
}

impl Default for EnvTokenStore {
    fn default() -> Self {
        Self::new("AMOCRM_ACCESS_TOKEN", "AMOCRM_REFRESH_TOKEN")
    }
}

impl EnvTokenStore {
    pub fn new(access_var: impl Into<String>, refresh_var: impl Into<String>) -> Self {
        Self {
            access_var: access_var.into(),
            refresh_var: refresh_var.into(),
        }
    }
}

impl TokenStore for EnvTokenStore {
    fn persist(&self, credentials: &Credentials) -> anyhow::Result<()> {
        if self.access_var.is_empty() || self.refresh_var.is_empty() {
            anyhow::bail!("token environment variable names cannot be empty");
        }
        std::env::set_var(&self.access_var, &credentials.access_token);
        std::env::set_var(&self.refresh_var, &credentials.refresh_token);
        tracing::debug!(
            "Rotated tokens written to {} / {}",
            self.access_var,
            self.refresh_var
        );
        Ok(())
    }
}

/// Keeps the last persisted pair in memory.
///
/// Clones share the same slot, so a handle kept by the host sees every
/// rotation the token manager makes.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    latest: Arc<RwLock<Option<Credentials>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Credentials> {
        self.latest.read().ok().and_then(|guard| guard.clone())
    }

    /// Number of times `persist` has been called.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    fn persist(&self, credentials: &Credentials) -> anyhow::Result<()> {
        let mut latest = self
            .latest
            .write()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        *latest = Some(credentials.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_keeps_latest() {
        let store = MemoryTokenStore::new();
        assert!(store.latest().is_none());

        store.persist(&Credentials::new("a1", "r1")).unwrap();
        store.persist(&Credentials::new("a2", "r2")).unwrap();

        let latest = store.latest().unwrap();
        assert_eq!(latest.access_token, "a2");
        assert_eq!(latest.refresh_token, "r2");
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryTokenStore::new();
        let handle = store.clone();

        store.persist(&Credentials::new("shared-a", "shared-r")).unwrap();

        assert_eq!(handle.latest().unwrap().access_token, "shared-a");
        assert_eq!(handle.writes(), 1);
    }

    #[test]
    fn test_env_store_sets_variables() {
        let store = EnvTokenStore::new(
            "AMOCRM_LEADS_PROXY_TEST_ACCESS",
            "AMOCRM_LEADS_PROXY_TEST_REFRESH",
        );
        store.persist(&Credentials::new("env-a", "env-r")).unwrap();

        assert_eq!(
            std::env::var("AMOCRM_LEADS_PROXY_TEST_ACCESS").unwrap(),
            "env-a"
        );
        assert_eq!(
            std::env::var("AMOCRM_LEADS_PROXY_TEST_REFRESH").unwrap(),
            "env-r"
        );
    }

    #[test]
    fn test_env_store_rejects_empty_names() {
        let store = EnvTokenStore::new("", "");
        assert!(store.persist(&Credentials::new("a", "r")).is_err());
    }
}
