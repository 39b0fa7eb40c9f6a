//! Exchange of client credentials for an access token, with bounded retry
//!
//! A [`ClientCredentialsTokenSource`][sources::oauth2::ClientCredentialsTokenSource] posts
//! a client ID and secret to a token authority using HTTP basic authentication and
//! reads the `access_token` field from the response.
//!
//! Each attempt is classified as a success, a transient failure, or a fatal failure.
//! Only transient failures (a `5xx` status from the authority) are retried. Retries are
//! spaced out linearly, as configured by a [`RetryConfig`][backoff::RetryConfig], and
//! stop once the attempt budget is spent. Anything else, including transport errors,
//! timeouts and `4xx` responses, fails the request immediately.
//!
//! ```
//! use std::time::Duration;
//! use rotor_tokens::{backoff::RetryConfig, sources, ClientId, ClientSecret};
//!
//! # let token_url = reqwest::Url::parse("https://example.com/oauth/token").unwrap();
//! let credentials = sources::oauth2::dto::ClientCredentials {
//!     client_id: ClientId::from_static("client"),
//!     client_secret: ClientSecret::from_static("secret"),
//! };
//!
//! let source = sources::oauth2::ClientCredentialsTokenSource::new(
//!     reqwest::Client::new(),
//!     token_url,
//!     credentials,
//!     RetryConfig::new(3, Duration::from_secs(1)),
//! )
//! .with_request_timeout(Duration::from_secs(5));
//! # let _ = source;
//! # /* Commented out due to this trying to interact with the world.
//! let token = source.request_token().await?;
//! # */
//! ```
//!
//! Credentials and tokens redact themselves when formatted, so they can be passed
//! to `tracing` fields without leaking. Use the alternate format (`{:#}`) to reveal
//! them deliberately.
//!
//! # Features
//!
//! * `oauth2` (default): provides the HTTP token source, built on [reqwest].

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

pub mod backoff;
mod braids;
pub mod sources;

pub use braids::*;
