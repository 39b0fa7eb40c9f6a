//! Reading and overwriting JSON-valued secrets
//!
//! A [`SecretStore`] moves raw secret strings in and out of some backing store.
//! [`read_json`] and [`write_json`] layer JSON parsing and serialization on top,
//! so callers work with typed values and get a single error type per direction.
//!
//! Each call makes exactly one attempt against the store. Failures are logged
//! with the secret's name before being returned.
//!
//! # Features
//!
//! * `aws` (default): a store backed by AWS Secrets Manager.
//! * `file` (default): a store backed by a local directory, one file per secret.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{error, sync::Arc};

use aliri_braid::braid;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[cfg(feature = "aws")]
#[cfg_attr(docsrs, doc(cfg(feature = "aws")))]
pub mod aws;
#[cfg(feature = "file")]
#[cfg_attr(docsrs, doc(cfg(feature = "file")))]
pub mod file;
pub mod in_memory;

/// The name or identifier of a secret in a store
#[braid(serde)]
pub struct SecretName;

type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// A failure reported by the backing store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has no secret by that name
    #[error("secret not found: {0}")]
    NotFound(SecretName),
    /// The secret exists but holds no string value
    #[error("secret has no string value: {0}")]
    NoStringValue(SecretName),
    /// The store could not be reached or refused the operation
    #[error("{message}")]
    Backend {
        /// A description of the failure
        message: String,
        /// The underlying error
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    /// Wraps an arbitrary backend failure, using its message as the description
    pub fn backend(err: impl Into<BoxError>) -> Self {
        let source = err.into();
        Self::Backend {
            message: source.to_string(),
            source,
        }
    }
}

/// Unable to read a secret as the requested type
#[derive(Debug, Error)]
pub enum SecretReadError {
    /// The store failed to return the secret
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The stored value is not JSON
    #[error("secret value is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    /// The stored value is JSON but not of the expected shape
    #[error("secret value has an unexpected shape: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl From<serde_json::Error> for SecretReadError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => Self::Malformed(err),
            _ => Self::InvalidJson(err),
        }
    }
}

/// Unable to overwrite a secret
#[derive(Debug, Error)]
pub enum SecretWriteError {
    /// The store failed to accept the new value
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The value could not be serialized
    #[error("unable to serialize secret value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A store holding secrets as strings, addressed by name
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches the current string value of a secret
    async fn get_secret_string(&self, name: &SecretNameRef) -> Result<String, StoreError>;

    /// Replaces the value of an existing secret
    async fn put_secret_string(&self, name: &SecretNameRef, value: String)
        -> Result<(), StoreError>;
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Box<S> {
    async fn get_secret_string(&self, name: &SecretNameRef) -> Result<String, StoreError> {
        (**self).get_secret_string(name).await
    }

    async fn put_secret_string(
        &self,
        name: &SecretNameRef,
        value: String,
    ) -> Result<(), StoreError> {
        (**self).put_secret_string(name, value).await
    }
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    async fn get_secret_string(&self, name: &SecretNameRef) -> Result<String, StoreError> {
        (**self).get_secret_string(name).await
    }

    async fn put_secret_string(
        &self,
        name: &SecretNameRef,
        value: String,
    ) -> Result<(), StoreError> {
        (**self).put_secret_string(name, value).await
    }
}

/// Reads a secret and parses its value as JSON
pub async fn read_json<T, S>(store: &S, name: &SecretNameRef) -> Result<T, SecretReadError>
where
    T: DeserializeOwned,
    S: SecretStore + ?Sized,
{
    let result = read_json_once(store, name).await;

    if let Err(error) = &result {
        tracing::error!(
            secret.name = %name,
            error = (error as &dyn error::Error),
            "error retrieving secret"
        );
    } else {
        tracing::debug!(secret.name = %name, "retrieved secret");
    }

    result
}

/// Serializes a value as JSON and overwrites a secret with it
pub async fn write_json<T, S>(
    store: &S,
    name: &SecretNameRef,
    value: &T,
) -> Result<(), SecretWriteError>
where
    T: Serialize + ?Sized,
    S: SecretStore + ?Sized,
{
    let result = write_json_once(store, name, value).await;

    match &result {
        Ok(()) => tracing::info!(secret.name = %name, "secret updated"),
        Err(error) => tracing::error!(
            secret.name = %name,
            error = (error as &dyn error::Error),
            "error updating secret"
        ),
    }

    result
}

async fn read_json_once<T, S>(store: &S, name: &SecretNameRef) -> Result<T, SecretReadError>
where
    T: DeserializeOwned,
    S: SecretStore + ?Sized,
{
    let raw = store.get_secret_string(name).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_json_once<T, S>(
    store: &S,
    name: &SecretNameRef,
    value: &T,
) -> Result<(), SecretWriteError>
where
    T: Serialize + ?Sized,
    S: SecretStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.put_secret_string(name, raw).await?;
    Ok(())
}
