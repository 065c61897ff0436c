//! JSON response envelopes.
//!
//! Handlers answer with either `{"success":true,"payload":...}` or
//! `{"success":false,"error":{"code":...,"message":...}}`. The encoders here
//! are used by [`RequestContext`](crate::context::RequestContext); [`Envelope`]
//! lets callers decode whichever shape comes back.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

#[derive(Serialize)]
struct SuccessEnvelope<'a> {
    success: bool,
    payload: &'a Value,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: &'a ErrorBody,
}

/// Error details carried by a failure envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Application-defined error code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

/// Encode a success envelope around `payload`.
///
/// A payload serializing to `null` is written as an empty object.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if `payload` cannot be represented as JSON.
pub fn encode_success<T>(payload: &T) -> serde_json::Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let payload = match serde_json::to_value(payload)? {
        Value::Null => Value::Object(Map::new()),
        value => value,
    };
    serde_json::to_vec(&SuccessEnvelope {
        success: true,
        payload: &payload,
    })
}

/// Encode a failure envelope.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if encoding fails.
pub fn encode_error(code: i32, message: &str) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&ErrorEnvelope {
        success: false,
        error: &ErrorBody {
            code,
            message: message.to_owned(),
        },
    })
}

/// Decoded form of either envelope shape.
///
/// # Examples
///
/// ```
/// use endrpc::envelope::{Envelope, encode_success};
///
/// let bytes = encode_success("hi bob").unwrap();
/// let envelope = Envelope::decode(&bytes).unwrap();
/// assert!(envelope.success);
/// assert_eq!(envelope.payload_as::<String>().unwrap(), "hi bob");
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Envelope {
    /// Whether the handler reported success.
    pub success: bool,
    /// Payload of a success envelope.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Details of a failure envelope.
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    /// Parse response bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `bytes` is not an envelope.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> { serde_json::from_slice(bytes) }

    /// Deserialize the payload into `T`. A missing payload is treated as `null`.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.payload.clone().unwrap_or(Value::Null))
    }

    /// Split into the payload or the error body.
    ///
    /// # Errors
    ///
    /// Returns the [`ErrorBody`] of a failure envelope. A failure envelope
    /// without details yields code `0` and an empty message.
    pub fn into_result(self) -> Result<Value, ErrorBody> {
        if self.success {
            Ok(self.payload.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or(ErrorBody {
                code: 0,
                message: String::new(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_envelope_wraps_payload() {
        let bytes = encode_success(&json!({"id": 7})).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value, json!({"success": true, "payload": {"id": 7}}));
    }

    #[test]
    fn null_payload_becomes_empty_object() {
        let bytes = encode_success(&Option::<u32>::None).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value, json!({"success": true, "payload": {}}));
    }

    #[test]
    fn error_envelope_carries_code_and_message() {
        let bytes = encode_error(401, "token expired").expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(
            value,
            json!({"success": false, "error": {"code": 401, "message": "token expired"}})
        );
        let err = Envelope::decode(&bytes)
            .expect("envelope")
            .into_result()
            .expect_err("failure envelope");
        assert_eq!(err.code, 401);
    }
}
