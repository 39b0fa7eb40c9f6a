//! An in-memory secret store

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use crate::{SecretName, SecretNameRef, SecretStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    secrets: HashMap<SecretName, String>,
    writes: Vec<(SecretName, String)>,
}

/// An in-memory secret store
///
/// Clones share the same contents. Every successful write is also recorded, in
/// order, so that tests can assert on exactly what was written.
#[derive(Clone, Debug, Default)]
pub struct InMemorySecretStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemorySecretStore {
    /// Constructs a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a secret
    pub fn with_secret(self, name: impl Into<SecretName>, value: impl Into<String>) -> Self {
        self.lock().secrets.insert(name.into(), value.into());
        self
    }

    /// The current value of a secret, if present
    pub fn secret(&self, name: &SecretNameRef) -> Option<String> {
        self.lock().secrets.get(name).cloned()
    }

    /// Every successful write so far, oldest first
    pub fn writes(&self) -> Vec<(SecretName, String)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret_string(&self, name: &SecretNameRef) -> Result<String, StoreError> {
        self.secret(name)
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    async fn put_secret_string(
        &self,
        name: &SecretNameRef,
        value: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.secrets.get_mut(name) {
            Some(current) => {
                current.clone_from(&value);
                inner.writes.push((name.to_owned(), value));
                Ok(())
            }
            None => Err(StoreError::NotFound(name.to_owned())),
        }
    }
}
