//! Response envelope shared by every gateway API endpoint

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `{success, errors, messages, result}` wrapper around every response body
///
/// Unknown fields are ignored so that additions on the remote side do not
/// break decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded
    #[serde(default = "default_success")]
    pub success: bool,

    /// Errors reported by the API
    #[serde(default)]
    pub errors: Vec<ApiMessage>,

    /// Informational messages
    #[serde(default)]
    pub messages: Vec<ApiMessage>,

    /// Payload, may be `null`
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

fn default_success() -> bool {
    true
}

/// Entry in the `errors` or `messages` arrays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Numeric code, when present
    #[serde(default)]
    pub code: Option<i64>,

    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl<T> ApiEnvelope<T> {
    /// Turn a `success: false` envelope into `ApiError::Api`
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.success {
            return Ok(self.result);
        }

        let reasons: Vec<String> = self
            .errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{} ({})", e.message, code),
                None => e.message.clone(),
            })
            .collect();

        let reason = if reasons.is_empty() {
            "request was not successful".to_string()
        } else {
            reasons.join("; ")
        };
        Err(ApiError::Api(reason))
    }
}

impl<T> ApiEnvelope<Vec<T>> {
    /// Collection payload, with `null` treated as empty
    pub fn into_items(self) -> Result<Vec<T>, ApiError> {
        Ok(self.into_result()?.unwrap_or_default())
    }
}

/// Decode an envelope from raw response bytes
pub fn decode<T>(body: &[u8]) -> Result<ApiEnvelope<T>, ApiError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}
