// File: ./src/secure_store.rs
//! Read access to the secure credential store.
//!
//! The access token is issued and written by someone else (the sign-in
//! flow, the host app). This crate only reads it, once per request, and
//! never keeps a copy.
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub enum StoreError {
    /// The backing store refused or failed the read (locked keychain, no
    /// default store registered, IPC failure...).
    Backend(String),
    /// The blocking read task died.
    Task(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(e) => write!(f, "Secure storage error: {}", e),
            StoreError::Task(e) => write!(f, "Secure storage read aborted: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// A key-value store living outside process memory.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Reads `key`. A missing or empty value is `Ok(None)`.
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// The platform keychain. Entries come from `keyring_core`'s default store
/// (see [`register_platform_store`]) unless a store is given explicitly.
#[derive(Clone)]
pub struct KeyringStore {
    service: String,
    store: Option<Arc<keyring_core::CredentialStore>>,
}

impl fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service", &self.service)
            .field("store", &self.store.as_ref().map(|s| s.vendor()))
            .finish()
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            store: None,
        }
    }

    /// Reads from `store` instead of the process-wide default.
    pub fn with_store(service: impl Into<String>, store: Arc<keyring_core::CredentialStore>) -> Self {
        Self {
            service: service.into(),
            store: Some(store),
        }
    }

    fn read_blocking(
        service: &str,
        key: &str,
        store: Option<&keyring_core::CredentialStore>,
    ) -> Result<Option<String>, StoreError> {
        let entry = match store {
            Some(store) => store.build(service, key, None),
            None => keyring_core::Entry::new(service, key),
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        match entry.get_password() {
            Ok(secret) => Ok(non_empty(secret)),
            Err(keyring_core::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }
}

/// Registers the OS keychain as `keyring_core`'s default store. Hosts that
/// bring their own storage (the mobile apps) skip this.
pub fn register_platform_store() -> Result<(), StoreError> {
    let store = platform_store().map_err(|e| StoreError::Backend(e.to_string()))?;
    log::debug!("Using credential store: {}", store.vendor());
    keyring_core::set_default_store(store);
    Ok(())
}

#[cfg(target_os = "linux")]
fn platform_store() -> keyring_core::Result<Arc<keyring_core::CredentialStore>> {
    match dbus_secret_service_keyring_store::Store::new() {
        Ok(store) => Ok(store),
        Err(e) => {
            // Headless sessions have no Secret Service; the kernel keyring still works.
            log::debug!("Secret Service unavailable ({}), using kernel keyutils", e);
            Ok(linux_keyutils_keyring_store::Store::new()?)
        }
    }
}

#[cfg(target_os = "macos")]
fn platform_store() -> keyring_core::Result<Arc<keyring_core::CredentialStore>> {
    Ok(apple_native_keyring_store::keychain::Store::new()?)
}

#[cfg(target_os = "windows")]
fn platform_store() -> keyring_core::Result<Arc<keyring_core::CredentialStore>> {
    Ok(windows_native_keyring_store::Store::new()?)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn platform_store() -> keyring_core::Result<Arc<keyring_core::CredentialStore>> {
    Err(keyring_core::Error::NotSupportedByStore(
        "no native credential store on this platform".to_string(),
    ))
}

impl CredentialStore for KeyringStore {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        let service = self.service.clone();
        let store = self.store.clone();
        let key = key.to_string();
        Box::pin(async move {
            // Keychain access is synchronous and may block on IPC.
            tokio::task::spawn_blocking(move || Self::read_blocking(&service, &key, store.as_deref()))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))?
        })
    }
}

/// In-process store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

impl CredentialStore for MemoryStore {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        let value = self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .and_then(non_empty);
        Box::pin(async move { Ok(value) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_reads_what_was_inserted() {
        let store = MemoryStore::with("access_token", "abc123");
        assert_eq!(
            store.read("access_token").await.unwrap().as_deref(),
            Some("abc123")
        );
        assert_eq!(store.read("refresh_token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_values_read_as_missing() {
        let store = MemoryStore::with("access_token", "");
        assert_eq!(store.read("access_token").await.unwrap(), None);
    }

    fn mock_keychain() -> Arc<keyring_core::CredentialStore> {
        keyring_core::mock::Store::new().unwrap()
    }

    #[tokio::test]
    async fn keychain_entry_is_read() {
        let keychain = mock_keychain();
        keychain
            .build("appshell", "access_token", None)
            .unwrap()
            .set_password("abc123")
            .unwrap();

        let store = KeyringStore::with_store("appshell", keychain);
        assert_eq!(
            store.read("access_token").await.unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn missing_keychain_entry_reads_as_none() {
        let store = KeyringStore::with_store("appshell", mock_keychain());
        assert_eq!(store.read("access_token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keychain_entries_are_scoped_by_service() {
        let keychain = mock_keychain();
        keychain
            .build("other-app", "access_token", None)
            .unwrap()
            .set_password("not-ours")
            .unwrap();

        let store = KeyringStore::with_store("appshell", keychain);
        assert_eq!(store.read("access_token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn removed_values_are_gone() {
        let store = MemoryStore::with("access_token", "abc123");
        assert_eq!(store.remove("access_token").as_deref(), Some("abc123"));
        assert_eq!(store.read("access_token").await.unwrap(), None);
    }
}
