//! A token source that uses an OAuth2 server as an authority

use std::{error, fmt, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use rotor_clock::{Sleep, TokioSleep};
use thiserror::Error;

use super::AsyncTokenSource;
use crate::{
    backoff::{RetryConfig, RetryHandler},
    AccessToken,
};

pub mod dto;

/// The time allowed for a single request to the authority
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// A token source for the client credentials flow
///
/// Credentials are sent using HTTP basic authentication with an empty request body.
#[derive(Debug)]
pub struct ClientCredentialsTokenSource<Z = TokioSleep> {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: dto::ClientCredentials,
    retry_config: RetryConfig,
    request_timeout: Duration,
    sleep: Z,
}

impl ClientCredentialsTokenSource<TokioSleep> {
    /// Constructs a new client credentials source
    ///
    /// The source waits between retries using the tokio timer and allows each request
    /// [`DEFAULT_REQUEST_TIMEOUT`] to complete.
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: dto::ClientCredentials,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
            retry_config,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sleep: TokioSleep,
        }
    }
}

impl<Z> ClientCredentialsTokenSource<Z> {
    /// Sets a custom way of waiting between retries
    ///
    /// Useful for testing purposes
    pub fn with_sleep<Y>(self, sleep: Y) -> ClientCredentialsTokenSource<Y> {
        ClientCredentialsTokenSource {
            client: self.client,
            token_url: self.token_url,
            credentials: self.credentials,
            retry_config: self.retry_config,
            request_timeout: self.request_timeout,
            sleep,
        }
    }

    /// Sets the time allowed for each individual request
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// The authority's token endpoint
    pub fn token_url(&self) -> &reqwest::Url {
        &self.token_url
    }

    /// Makes a single request to the authority and classifies the outcome
    pub async fn attempt(&self) -> Attempt {
        attempt(
            &self.client,
            &self.token_url,
            &self.credentials,
            self.request_timeout,
        )
        .await
    }
}

#[async_trait]
impl<Z: Sleep> AsyncTokenSource for ClientCredentialsTokenSource<Z> {
    type Error = TokenFetchError;

    async fn request_token(&mut self) -> Result<AccessToken, Self::Error> {
        request_token(self).await
    }
}

/// The outcome of a single request to the authority
#[derive(Debug)]
pub enum Attempt {
    /// The authority issued a token
    Success(AccessToken),
    /// The authority had a server-side problem; the request may be retried
    Transient {
        /// The `5xx` status returned
        status: StatusCode,
    },
    /// The request failed in a way that retrying will not fix
    Fatal(TokenFetchError),
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenFetchError {
    /// Unable to send a token request to the authority, or no response arrived in time
    #[error("Token fetch failed: {}", Chain(.0))]
    RequestSend(#[source] reqwest::Error),
    /// The authority rejected the request
    #[error("Token fetch failed: authority responded with {status}: {body}")]
    ErrorStatus {
        /// The status returned by the authority
        status: StatusCode,
        /// The body of the response
        body: String,
    },
    /// Unable to read the response
    #[error("Token fetch failed: error reading response body: {}", Chain(.0))]
    BodyRead(#[source] reqwest::Error),
    /// Unable to deserialize the token body
    #[error("Token fetch failed: error deserializing token body: {0}")]
    TokenBody(#[from] serde_json::Error),
    /// The authority reported success but did not issue a usable token
    #[error("Token fetch failed: response did not include an access token")]
    MissingAccessToken,
    /// Every attempt ended in a transient failure
    #[error("Max retries ({max_attempts}) exceeded")]
    MaxRetriesExceeded {
        /// The configured attempt limit
        max_attempts: u32,
    },
}

impl TokenFetchError {
    /// Whether the request was abandoned because the retry budget was spent
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::MaxRetriesExceeded { .. })
    }
}

/// Renders an error followed by each of its sources
struct Chain<'a>(&'a dyn error::Error);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self.0, f)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}

#[tracing::instrument(
    err,
    skip(source),
    fields(
        token_url = %source.token_url,
        credentials.client_id = %source.credentials.client_id,
        retry.max_attempts = source.retry_config.max_attempts(),
    ),
)]
async fn request_token<Z: Sleep>(
    source: &ClientCredentialsTokenSource<Z>,
) -> Result<AccessToken, TokenFetchError> {
    let mut retry = RetryHandler::new(source.retry_config);

    loop {
        match source.attempt().await {
            Attempt::Success(token) => {
                tracing::info!(attempt = retry.attempts() + 1, "received new access token");
                return Ok(token);
            }
            Attempt::Fatal(error) => return Err(error),
            Attempt::Transient { status } => match retry.transient_failure() {
                Some(delay) => {
                    tracing::warn!(
                        response.status = status.as_u16(),
                        attempt = retry.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "transient error from authority, will retry"
                    );
                    source.sleep.sleep(delay).await;
                }
                None => {
                    return Err(TokenFetchError::MaxRetriesExceeded {
                        max_attempts: source.retry_config.max_attempts(),
                    });
                }
            },
        }
    }
}

async fn attempt(
    client: &reqwest::Client,
    token_url: &reqwest::Url,
    credentials: &dto::ClientCredentials,
    request_timeout: Duration,
) -> Attempt {
    tracing::trace!("requesting token from authority");

    let resp = client
        .post(token_url.clone())
        .basic_auth(
            credentials.client_id.as_str(),
            Some(credentials.client_secret.as_str()),
        )
        .timeout(request_timeout)
        .send()
        .await;

    let resp = match resp {
        Ok(resp) => resp,
        Err(error) => return Attempt::Fatal(TokenFetchError::RequestSend(error)),
    };

    let status = resp.status();
    tracing::debug!(
        response.status = status.as_u16(),
        "received token response from issuing authority"
    );

    if status.is_server_error() {
        return Attempt::Transient { status };
    }

    if !status.is_success() {
        return match resp.text().await {
            Ok(body) => Attempt::Fatal(TokenFetchError::ErrorStatus { status, body }),
            Err(error) => Attempt::Fatal(TokenFetchError::BodyRead(error)),
        };
    }

    match read_token(resp).await {
        Ok(token) => Attempt::Success(token),
        Err(error) => Attempt::Fatal(error),
    }
}

async fn read_token(resp: reqwest::Response) -> Result<AccessToken, TokenFetchError> {
    let body = resp.bytes().await.map_err(TokenFetchError::BodyRead)?;
    let resp: dto::TokenResponse = serde_json::from_slice(&body)?;

    tracing::debug!(
        token_type = resp.token_type.as_deref().unwrap_or_default(),
        has_expiry = resp.expires_in.is_some(),
        "parsed token response"
    );

    match resp.access_token {
        Some(token) if !token.as_str().is_empty() => Ok(token),
        _ => Err(TokenFetchError::MissingAccessToken),
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use rotor_clock::TestSleep;
    use serde_json::json;
    use wiremock::{
        matchers::{basic_auth, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{ClientId, ClientSecret};

    const TOKEN_PATH: &str = "/oauth/token";

    fn source_for(server: &MockServer, sleep: &TestSleep) -> ClientCredentialsTokenSource<TestSleep> {
        let token_url = reqwest::Url::parse(&format!("{}{}", server.uri(), TOKEN_PATH)).unwrap();
        source_at(token_url, sleep)
    }

    fn source_at(token_url: reqwest::Url, sleep: &TestSleep) -> ClientCredentialsTokenSource<TestSleep> {
        ClientCredentialsTokenSource::new(
            reqwest::Client::new(),
            token_url,
            dto::ClientCredentials {
                client_id: ClientId::from_static("client-1"),
                client_secret: ClientSecret::from_static("s3cr3t"),
            },
            RetryConfig::default(),
        )
        .with_sleep(sleep.clone())
    }

    fn token_body(token: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
    }

    #[tokio::test]
    async fn first_attempt_success_sends_basic_auth_and_empty_body() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(basic_auth("client-1", "s3cr3t"))
            .respond_with(token_body("T123"))
            .expect(1)
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let token = source_for(&server, &sleep).request_token().await?;

        assert_eq!(token.as_str(), "T123");
        assert!(sleep.slept().is_empty());

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn transient_errors_back_off_linearly_then_succeed() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(token_body("ABC"))
            .expect(1)
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let token = source_for(&server, &sleep).request_token().await?;

        assert_eq!(token.as_str(), "ABC");
        assert_eq!(
            sleep.slept(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert!(sleep.total() >= Duration::from_millis(3000));
        Ok(())
    }

    #[tokio::test]
    async fn every_5xx_status_is_transient() -> Result<()> {
        for status in [500, 502, 504, 599] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .up_to_n_times(1)
                .with_priority(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .respond_with(token_body("after-retry"))
                .mount(&server)
                .await;

            let sleep = TestSleep::new();
            let token = source_for(&server, &sleep).request_token().await?;

            assert_eq!(token.as_str(), "after-retry", "status {}", status);
            assert_eq!(sleep.slept(), vec![Duration::from_secs(1)], "status {}", status);
        }
        Ok(())
    }

    #[tokio::test]
    async fn exhausting_attempts_reports_the_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let err = source_for(&server, &sleep)
            .request_token()
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert!(err.to_string().contains('3'), "{}", err);
        assert_eq!(err.to_string(), "Max retries (3) exceeded");
        assert_eq!(
            sleep.slept(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn unauthorized_fails_immediately_with_cause() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .expect(1)
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let err = source_for(&server, &sleep)
            .request_token()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TokenFetchError::ErrorStatus { status: StatusCode::UNAUTHORIZED, .. }
        ));
        let message = err.to_string();
        assert!(message.starts_with("Token fetch failed: "), "{}", message);
        assert!(message.contains("401"), "{}", message);
        assert!(message.contains("invalid_client"), "{}", message);
        assert!(sleep.slept().is_empty());
    }

    #[tokio::test]
    async fn client_errors_are_never_retried() {
        for status in [400, 403, 404, 429] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .expect(1)
                .mount(&server)
                .await;

            let sleep = TestSleep::new();
            let err = source_for(&server, &sleep)
                .request_token()
                .await
                .unwrap_err();

            assert!(!err.is_exhausted(), "status {}", status);
            assert!(sleep.slept().is_empty(), "status {}", status);
        }
    }

    #[tokio::test]
    async fn connection_failures_are_fatal() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sleep = TestSleep::new();
        let token_url = reqwest::Url::parse(&format!("http://{}{}", addr, TOKEN_PATH)).unwrap();
        let err = source_at(token_url, &sleep)
            .request_token()
            .await
            .unwrap_err();

        assert!(matches!(err, TokenFetchError::RequestSend(_)), "{:?}", err);
        assert!(err.to_string().starts_with("Token fetch failed: "));
        assert!(sleep.slept().is_empty());
    }

    #[tokio::test]
    async fn slow_authority_times_out_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(token_body("too-late").set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let err = source_for(&server, &sleep)
            .with_request_timeout(Duration::from_millis(100))
            .request_token()
            .await
            .unwrap_err();

        assert!(matches!(err, TokenFetchError::RequestSend(ref e) if e.is_timeout()), "{:?}", err);
        assert!(sleep.slept().is_empty());
    }

    #[tokio::test]
    async fn success_without_access_token_is_fatal() {
        for body in [json!({ "token_type": "Bearer" }), json!({ "access_token": "" })] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(&body))
                .expect(1)
                .mount(&server)
                .await;

            let sleep = TestSleep::new();
            let err = source_for(&server, &sleep)
                .request_token()
                .await
                .unwrap_err();

            assert!(matches!(err, TokenFetchError::MissingAccessToken), "{}", body);
            assert!(sleep.slept().is_empty());
        }
    }

    #[tokio::test]
    async fn success_with_non_json_body_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let err = source_for(&server, &sleep)
            .request_token()
            .await
            .unwrap_err();

        assert!(matches!(err, TokenFetchError::TokenBody(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn single_attempt_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let sleep = TestSleep::new();
        let outcome = source_for(&server, &sleep).attempt().await;

        assert!(matches!(
            outcome,
            Attempt::Transient { status: StatusCode::BAD_GATEWAY }
        ));
    }
}
