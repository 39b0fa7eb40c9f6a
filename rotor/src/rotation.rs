use std::{error, fmt, time::Duration};

use rotor_clock::{Clock, Sleep, System, Timestamp, TokioSleep};
use rotor_secrets::{read_json, write_json, SecretName, SecretStore};
use rotor_tokens::{
    backoff::RetryConfig,
    sources::{
        oauth2::{ClientCredentialsTokenSource, TokenFetchError, DEFAULT_REQUEST_TIMEOUT},
        AsyncTokenSource,
    },
};

use crate::{
    records::{SourceCredentialRecord, TargetTokenRecord},
    RotationError, RotationResponse,
};

/// Reads credentials, obtains a fresh token, and writes it back
///
/// Everything a rotation touches is supplied at construction, so a rotation can be
/// pointed at an in-memory store, a fixed clock and a sleeper that does not wait.
pub struct TokenRotation<St, C = System, Z = TokioSleep> {
    store: St,
    client: reqwest::Client,
    source_secret: SecretName,
    target_secret: SecretName,
    retry_config: RetryConfig,
    request_timeout: Duration,
    clock: C,
    sleep: Z,
}

impl<St> TokenRotation<St> {
    /// Constructs a new rotation between two secrets in `store`
    ///
    /// Uses the default retry configuration and request timeout, the system clock,
    /// and the tokio timer.
    pub fn new(
        store: St,
        client: reqwest::Client,
        source_secret: SecretName,
        target_secret: SecretName,
    ) -> Self {
        Self {
            store,
            client,
            source_secret,
            target_secret,
            retry_config: RetryConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            clock: System,
            sleep: TokioSleep,
        }
    }
}

impl<St, C, Z> TokenRotation<St, C, Z> {
    /// Sets how transient authority failures are retried
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Sets the time allowed for each request to the authority
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Sets a custom clock to be used when stamping the new token
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenRotation<St, D, Z> {
        TokenRotation {
            store: self.store,
            client: self.client,
            source_secret: self.source_secret,
            target_secret: self.target_secret,
            retry_config: self.retry_config,
            request_timeout: self.request_timeout,
            clock,
            sleep: self.sleep,
        }
    }

    /// Sets a custom way of waiting between retries
    ///
    /// Useful for testing purposes
    pub fn with_sleep<Y>(self, sleep: Y) -> TokenRotation<St, C, Y> {
        TokenRotation {
            store: self.store,
            client: self.client,
            source_secret: self.source_secret,
            target_secret: self.target_secret,
            retry_config: self.retry_config,
            request_timeout: self.request_timeout,
            clock: self.clock,
            sleep,
        }
    }
}

impl<St, C, Z> fmt::Debug for TokenRotation<St, C, Z>
where
    C: fmt::Debug,
    Z: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenRotation")
            .field("source_secret", &self.source_secret)
            .field("target_secret", &self.target_secret)
            .field("retry_config", &self.retry_config)
            .field("request_timeout", &self.request_timeout)
            .field("clock", &self.clock)
            .field("sleep", &self.sleep)
            .finish_non_exhaustive()
    }
}

impl<St, C, Z> TokenRotation<St, C, Z>
where
    St: SecretStore,
    C: Clock + Send + Sync,
    Z: Sleep + Clone,
{
    /// Runs one rotation, reporting the outcome as a response
    ///
    /// Never fails: any error is logged and reported as a `500` response carrying
    /// the error's message.
    pub async fn handle(&self) -> RotationResponse {
        match self.run().await {
            Ok(()) => RotationResponse::success(),
            Err(error) => {
                tracing::error!(
                    error = (&error as &dyn error::Error),
                    secret.name = error.secret().map(|s| s.as_str()),
                    "error in token rotation"
                );
                RotationResponse::failure(error.to_string())
            }
        }
    }

    /// Runs one rotation
    #[tracing::instrument(
        skip(self),
        fields(
            source.secret = %self.source_secret,
            target.secret = %self.target_secret,
        ),
    )]
    pub async fn run(&self) -> Result<(), RotationError> {
        let source: SourceCredentialRecord = read_json(&self.store, &self.source_secret)
            .await
            .map_err(|source| RotationError::SecretRetrieval {
                secret: self.source_secret.clone(),
                source,
            })?;

        tracing::debug!(
            token_url = %source.token_url,
            client_id = %source.client_id,
            "loaded source credentials"
        );

        let mut tokens = ClientCredentialsTokenSource::new(
            self.client.clone(),
            source.token_url.clone(),
            source.credentials(),
            self.retry_config,
        )
        .with_request_timeout(self.request_timeout)
        .with_sleep(self.sleep.clone());

        self.rotate_from(&mut tokens).await
    }

    /// Obtains a token from `tokens` and writes it to the target secret
    ///
    /// The target secret is left untouched if no token is obtained.
    pub async fn rotate_from<S>(&self, tokens: &mut S) -> Result<(), RotationError>
    where
        S: AsyncTokenSource<Error = TokenFetchError>,
    {
        let api_token = tokens.request_token().await?;

        let record = TargetTokenRecord {
            api_token,
            updated_at: Timestamp::now_from(&self.clock),
        };

        write_json(&self.store, &self.target_secret, &record)
            .await
            .map_err(|source| RotationError::SecretUpdate {
                secret: self.target_secret.clone(),
                source,
            })?;

        tracing::info!(updated_at = %record.updated_at, "token rotated");
        Ok(())
    }
}
