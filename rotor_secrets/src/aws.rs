//! A secret store backed by AWS Secrets Manager

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::{error::DisplayErrorContext, Client};

use crate::{SecretNameRef, SecretStore, StoreError};

/// The region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// A secret store that uses AWS Secrets Manager
///
/// Reads use `GetSecretValue` and only accept secrets holding a string value.
/// Writes use `UpdateSecret`, which replaces the whole value of an existing secret.
#[derive(Clone, Debug)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    /// Constructs a new store from an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Constructs a new store for `region`, loading credentials from the environment
    pub async fn from_region(region: impl Into<String>) -> Self {
        let region = Region::new(region.into());
        tracing::debug!(%region, "loading AWS configuration");

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        Self::new(Client::new(&config))
    }
}

fn backend_error<E>(err: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend {
        message: DisplayErrorContext(&err).to_string(),
        source: Box::new(err),
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret_string(&self, name: &SecretNameRef) -> Result<String, StoreError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name.as_str())
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_resource_not_found_exception() {
                    StoreError::NotFound(name.to_owned())
                } else {
                    backend_error(err)
                }
            })?;

        output
            .secret_string
            .ok_or_else(|| StoreError::NoStringValue(name.to_owned()))
    }

    async fn put_secret_string(
        &self,
        name: &SecretNameRef,
        value: String,
    ) -> Result<(), StoreError> {
        let output = self
            .client
            .update_secret()
            .secret_id(name.as_str())
            .secret_string(value)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_resource_not_found_exception() {
                    StoreError::NotFound(name.to_owned())
                } else {
                    backend_error(err)
                }
            })?;

        tracing::debug!(
            secret.name = %name,
            secret.version_id = output.version_id().unwrap_or_default(),
            "secret value replaced"
        );

        Ok(())
    }
}
