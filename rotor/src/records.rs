//! The shapes of the source and target secrets

use rotor_clock::Timestamp;
use rotor_tokens::{sources::oauth2::dto::ClientCredentials, AccessToken, ClientId, ClientSecret};
use serde::{Deserialize, Serialize};
use url::Url;

/// Where to get a token and how to authenticate
#[derive(Clone, Debug, Deserialize)]
pub struct SourceCredentialRecord {
    /// The authority's token endpoint
    #[serde(rename = "TOKEN_URL")]
    pub token_url: Url,
    /// The client ID
    #[serde(rename = "CLIENT_ID")]
    pub client_id: ClientId,
    /// The client secret
    #[serde(rename = "CLIENT_SECRET")]
    pub client_secret: ClientSecret,
}

impl SourceCredentialRecord {
    /// The credential pair to present to the authority
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

/// The value written to the target secret, replacing whatever was there
#[derive(Debug, Serialize)]
pub struct TargetTokenRecord {
    /// The newly issued access token
    #[serde(rename = "API_TOKEN")]
    pub api_token: AccessToken,
    /// When the token was obtained
    #[serde(rename = "UPDATED_AT")]
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn source_record_reads_upper_case_fields() {
        let record: SourceCredentialRecord = serde_json::from_value(json!({
            "TOKEN_URL": "https://auth.example.com/oauth/token",
            "CLIENT_ID": "client",
            "CLIENT_SECRET": "secret",
            "EXTRA": "ignored",
        }))
        .unwrap();

        assert_eq!(record.token_url.as_str(), "https://auth.example.com/oauth/token");
        assert_eq!(record.client_id.as_str(), "client");
        assert_eq!(record.credentials().client_secret.as_str(), "secret");
        assert!(format!("{:?}", record).contains("***CLIENT SECRET***"));
    }

    #[test]
    fn source_record_rejects_bad_url() {
        let result = serde_json::from_value::<SourceCredentialRecord>(json!({
            "TOKEN_URL": "not a url",
            "CLIENT_ID": "client",
            "CLIENT_SECRET": "secret",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn target_record_writes_token_and_timestamp() {
        let record = TargetTokenRecord {
            api_token: AccessToken::from_static("T123"),
            updated_at: Timestamp::from(datetime!(2024-05-06 07:08:09.010 UTC)),
        };

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "API_TOKEN": "T123", "UPDATED_AT": "2024-05-06T07:08:09.010Z" })
        );
    }
}
