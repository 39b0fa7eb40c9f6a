//! DTOs for interacting with OAuth2 token authorities

use serde::Deserialize;

use crate::{AccessToken, ClientId, ClientSecret};

/// Client credentials
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,
}

/// The body of a successful response from the authority
///
/// Only `access_token` is acted on. The other fields are informational and are not
/// validated; authorities disagree on whether `expires_in` is a number or a string.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_string_expiry_and_extra_fields() {
        let body = r#"{"access_token":"abc","expires_in":"3600","scope":"read","token_type":"Bearer"}"#;
        let resp: TokenResponse = serde_json::from_str(body).unwrap();

        assert_eq!(resp.access_token.as_deref().map(|t| t.as_str()), Some("abc"));
        assert_eq!(resp.token_type.as_deref(), Some("Bearer"));
        assert!(resp.expires_in.is_some());
    }

    #[test]
    fn access_token_may_be_absent_or_null() {
        let resp: TokenResponse = serde_json::from_str(r#"{"token_type":"Bearer"}"#).unwrap();
        assert!(resp.access_token.is_none());

        let resp: TokenResponse = serde_json::from_str(r#"{"access_token":null}"#).unwrap();
        assert!(resp.access_token.is_none());
    }
}
