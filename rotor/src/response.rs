//! The response returned to the scheduler after each rotation

use serde::{Deserialize, Serialize};

/// The result reported to whoever invoked the rotation
///
/// Serializes as `{"statusCode": 200, "body": "{\"message\":\"...\"}"}`; the body is
/// itself a JSON document, encoded as a string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationResponse {
    /// `200` on success, `500` on any failure
    pub status_code: u16,
    /// A JSON-encoded [`MessageBody`]
    pub body: String,
}

/// The decoded body of a [`RotationResponse`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// A human-readable outcome
    pub message: String,
}

impl RotationResponse {
    /// The message reported on success
    pub const SUCCESS_MESSAGE: &'static str = "Token rotated successfully";

    /// A successful rotation
    pub fn success() -> Self {
        Self::with_message(200, Self::SUCCESS_MESSAGE)
    }

    /// A failed rotation, described by `message`
    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_message(500, message)
    }

    fn with_message(status_code: u16, message: impl Into<String>) -> Self {
        let body = serde_json::json!({ "message": message.into() }).to_string();
        Self { status_code, body }
    }

    /// Whether the rotation succeeded
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Decodes the body
    pub fn message_body(&self) -> Result<MessageBody, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
