//! Typed view over the two well-known credential entries.

use std::sync::Arc;

use super::error::StoreError;
use super::store::CredentialStore;
use super::types::{CredentialKeys, CredentialPair, SessionHealth};

/// Reads and writes the credential pair through a [`CredentialStore`].
///
/// Empty stored values are treated as absent.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn CredentialStore>,
    keys: CredentialKeys,
}

impl Credentials {
    pub fn new(store: Arc<dyn CredentialStore>, keys: CredentialKeys) -> Self {
        Self { store, keys }
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.read(&self.keys.access)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.read(&self.keys.refresh)
    }

    /// Replace both entries wholesale, as a login does.
    pub fn store_pair(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.store.set(&self.keys.access, pair.access_token.trim())?;
        self.store.set(&self.keys.refresh, pair.refresh_token.trim())
    }

    /// Persist a refresh result; the refresh entry is only replaced on rotation.
    pub fn store_refreshed(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        self.store.set(&self.keys.access, access)?;
        if let Some(rotated) = refresh {
            self.store.set(&self.keys.refresh, rotated)?;
        }
        Ok(())
    }

    /// Remove both entries. Returns `true` when anything was removed.
    pub fn clear(&self) -> Result<bool, StoreError> {
        let access = self.store.remove(&self.keys.access)?;
        let refresh = self.store.remove(&self.keys.refresh)?;
        Ok(access || refresh)
    }

    pub fn health(&self) -> Result<SessionHealth, StoreError> {
        Ok(SessionHealth {
            has_access_token: self.access_token()?.is_some(),
            has_refresh_token: self.refresh_token()?.is_some(),
        })
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .get(key)?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    fn credentials() -> (Arc<MemoryStore>, Credentials) {
        let store = Arc::new(MemoryStore::new());
        let creds = Credentials::new(store.clone(), CredentialKeys::default());
        (store, creds)
    }

    #[test]
    fn store_refreshed_keeps_refresh_token_without_rotation() {
        let (store, creds) = credentials();
        creds
            .store_pair(&CredentialPair::new("access1", "refresh1"))
            .unwrap();
        creds.store_refreshed("access2", None).unwrap();
        assert_eq!(creds.access_token().unwrap().as_deref(), Some("access2"));
        assert_eq!(store.get("refresh_token").unwrap().as_deref(), Some("refresh1"));

        creds.store_refreshed("access3", Some("refresh2")).unwrap();
        assert_eq!(creds.refresh_token().unwrap().as_deref(), Some("refresh2"));
    }

    #[test]
    fn empty_values_read_as_absent() {
        let (store, creds) = credentials();
        store.set("access_token", "   ").unwrap();
        assert_eq!(creds.access_token().unwrap(), None);
        assert!(!creds.health().unwrap().is_logged_in());
    }

    #[test]
    fn clear_removes_both_entries() {
        let (_store, creds) = credentials();
        assert!(!creds.clear().unwrap());
        creds.store_pair(&CredentialPair::new("a", "r")).unwrap();
        assert!(creds.clear().unwrap());
        assert_eq!(creds.access_token().unwrap(), None);
        assert_eq!(creds.refresh_token().unwrap(), None);
    }

    #[test]
    fn custom_keys_are_respected() {
        let store = Arc::new(MemoryStore::new());
        let creds = Credentials::new(
            store.clone(),
            CredentialKeys {
                access: "shop.access".to_string(),
                refresh: "shop.refresh".to_string(),
            },
        );
        creds.store_pair(&CredentialPair::new("a", "r")).unwrap();
        assert_eq!(store.get("shop.access").unwrap().as_deref(), Some("a"));
        assert_eq!(store.get("access_token").unwrap(), None);
    }
}
