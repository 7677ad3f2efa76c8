//! Secure-store backed credential unlinking
//!
//! Cloud OAuth tokens live in the host [`SecureStore`] under a common key
//! prefix. Unlinking deletes every secret under that prefix so the next sync
//! attempt has to authorize from scratch.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{CredentialStore, SecureStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Key prefix of the stored cloud credentials.
pub const DEFAULT_CREDENTIAL_PREFIX: &str = "cloud.oauth.";

/// [`CredentialStore`] on top of a [`SecureStore`].
pub struct SecureStoreCredentials {
    secure_store: Arc<dyn SecureStore>,
    prefix: String,
}

impl SecureStoreCredentials {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::with_prefix(secure_store, DEFAULT_CREDENTIAL_PREFIX)
    }

    pub fn with_prefix(secure_store: Arc<dyn SecureStore>, prefix: impl Into<String>) -> Self {
        Self {
            secure_store,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl CredentialStore for SecureStoreCredentials {
    async fn unlink_credentials(&self) -> Result<()> {
        let keys = self.secure_store.list_keys().await.map_err(|e| {
            warn!(error = %e, "Failed to list keys from secure storage");
            e
        })?;

        let mut removed = 0usize;
        for key in keys.iter().filter(|key| key.starts_with(&self.prefix)) {
            self.secure_store.delete_secret(key).await.map_err(|e| {
                warn!(error = %e, "Failed to delete cloud credential");
                e
            })?;
            removed += 1;
        }

        info!(removed, "Cloud credentials unlinked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemorySecureStore {
        storage: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecureStore for MemorySecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> Result<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            Ok(self.storage.lock().await.keys().cloned().collect())
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl SecureStore for UnavailableStore {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Err(BridgeError::NotAvailable("keychain".to_string()))
        }

        async fn get_secret(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(BridgeError::NotAvailable("keychain".to_string()))
        }

        async fn delete_secret(&self, _key: &str) -> Result<()> {
            Err(BridgeError::NotAvailable("keychain".to_string()))
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            Err(BridgeError::NotAvailable("keychain".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unlink_removes_only_prefixed_keys() {
        let store = Arc::new(MemorySecureStore::default());
        store
            .set_secret("cloud.oauth.access_token", b"a")
            .await
            .unwrap();
        store
            .set_secret("cloud.oauth.refresh_token", b"r")
            .await
            .unwrap();
        store.set_secret("other.api_key", b"k").await.unwrap();

        let credentials = SecureStoreCredentials::new(store.clone());
        credentials.unlink_credentials().await.unwrap();

        assert!(!store.has_secret("cloud.oauth.access_token").await.unwrap());
        assert!(!store.has_secret("cloud.oauth.refresh_token").await.unwrap());
        assert!(store.has_secret("other.api_key").await.unwrap());
    }

    #[tokio::test]
    async fn test_unlink_twice_is_fine() {
        let store = Arc::new(MemorySecureStore::default());
        let credentials = SecureStoreCredentials::with_prefix(store, "svc.");

        credentials.unlink_credentials().await.unwrap();
        credentials.unlink_credentials().await.unwrap();
        assert_eq!(credentials.prefix(), "svc.");
    }

    #[tokio::test]
    async fn test_unlink_propagates_store_errors() {
        let credentials = SecureStoreCredentials::new(Arc::new(UnavailableStore));

        let result = credentials.unlink_credentials().await;
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }
}
