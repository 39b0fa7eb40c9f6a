//! Failures of a single rotation, one variant per stage

use rotor_secrets::{SecretName, SecretReadError, SecretWriteError};
use rotor_tokens::sources::oauth2::TokenFetchError;
use thiserror::Error;

/// A failed rotation
///
/// The message of each variant is the message of the underlying failure, which is
/// what gets reported to the invoker.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The source secret could not be read
    #[error("{source}")]
    SecretRetrieval {
        /// The secret being read
        secret: SecretName,
        /// The underlying failure
        source: SecretReadError,
    },
    /// No token could be obtained from the authority
    #[error(transparent)]
    TokenFetch(#[from] TokenFetchError),
    /// The target secret could not be updated
    #[error("{source}")]
    SecretUpdate {
        /// The secret being written
        secret: SecretName,
        /// The underlying failure
        source: SecretWriteError,
    },
}

impl RotationError {
    /// The secret involved in the failure, if any
    pub fn secret(&self) -> Option<&SecretName> {
        match self {
            Self::SecretRetrieval { secret, .. } | Self::SecretUpdate { secret, .. } => {
                Some(secret)
            }
            Self::TokenFetch(_) => None,
        }
    }
}
