//! Wire messages exchanged between callers and the dispatcher.
//!
//! A call carries a [`Request`] inside a [`RequestFrame`] and is answered by a
//! [`ReplyFrame`]. Routing information lives entirely in the request payload:
//! the transport exposes a single generic operation.

use std::{borrow::Borrow, collections::HashMap, fmt};

use bincode::{
    Decode,
    Encode,
    config,
    decode_from_slice,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};

/// Request parameters keyed by name.
pub type Params = HashMap<String, String>;
/// Request header values keyed by name.
pub type Header = HashMap<String, String>;
/// Uploaded files keyed by name.
pub type Files = HashMap<String, Vec<u8>>;

/// Status code sent when no handler is registered for a routing key.
pub const STATUS_NOT_FOUND: i32 = 404;
/// Status code sent when an incoming frame cannot be decoded.
pub const STATUS_BAD_REQUEST: i32 = 400;
/// Status code for failures inside the dispatcher itself.
pub const STATUS_INTERNAL_ERROR: i32 = 500;

/// Upper bound on the memory a single message may claim while decoding.
///
/// Collection lengths inside a frame are checked against this limit before
/// anything is allocated, so a forged length fails with
/// [`DecodeError::LimitExceeded`] instead of exhausting memory.
pub const DECODE_LIMIT: usize = 4 * 1024 * 1024;

/// Wrapper trait for frame types travelling over the wire.
///
/// Any type deriving [`Encode`] and [`Decode`] implements this trait through
/// the blanket implementation and is encoded with bincode's standard
/// configuration. Decoding is additionally bounded by [`DECODE_LIMIT`].
pub trait Message: Encode + Decode<()> + Sized {
    /// Serialize the message into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if serialization fails.
    fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> { encode_to_vec(self, config::standard()) }

    /// Deserialize a message from a byte slice, returning the message and
    /// the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if deserialization fails or the message
    /// claims more than [`DECODE_LIMIT`] bytes.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        decode_from_slice(bytes, config::standard().with_limit::<DECODE_LIMIT>())
    }
}

impl<T> Message for T where T: Encode + Decode<()> {}

/// A remote call addressed to a `controller`/`action` pair.
///
/// Handlers only ever see a shared reference to the request.
///
/// # Examples
///
/// ```
/// use endrpc::message::Request;
///
/// let request = Request::new("hello", "world").with_param("name", "bob");
/// assert_eq!(request.routing_key().as_str(), "hello/world");
/// assert_eq!(request.params.get("name").map(String::as_str), Some("bob"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Request {
    /// First half of the routing key.
    pub controller: String,
    /// Second half of the routing key.
    pub action: String,
    /// Call parameters.
    pub params: Params,
    /// Metadata filled in by gateways, such as the client address.
    pub header: Header,
    /// Binary attachments.
    pub files: Files,
}

impl Request {
    /// Create a request without parameters, header values, or files.
    #[must_use]
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    /// Replace the parameter map.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Insert a single parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Insert a single header value.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }

    /// Attach a file.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }

    /// The key used to look up this request's handler.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey { RoutingKey::new(&self.controller, &self.action) }
}

/// Raw response bytes produced by the handler chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Reply {
    /// Serialized response envelope.
    pub data: Vec<u8>,
}

impl Reply {
    /// Whether no handler wrote a response.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

/// Routing key in the form `controller/action`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Join `controller` and `action` into a routing key.
    #[must_use]
    pub fn new(controller: &str, action: &str) -> Self {
        let mut key = String::with_capacity(controller.len() + action.len() + 1);
        key.push_str(controller);
        key.push('/');
        key.push_str(action);
        Self(key)
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Borrow<str> for RoutingKey {
    fn borrow(&self) -> &str { &self.0 }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Frame sent by a caller for a single call.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RequestFrame {
    /// Remaining time the caller is prepared to wait, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// The call itself.
    pub request: Request,
}

/// Frame returned for a single call.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ReplyFrame {
    /// The handler chain ran and produced these bytes.
    Reply(Reply),
    /// The call was rejected before reaching any handler.
    Status {
        /// Numeric status, for example [`STATUS_NOT_FOUND`].
        code: i32,
        /// Human-readable reason.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_joins_with_slash() {
        let key = RoutingKey::new("user", "login");
        assert_eq!(key.as_str(), "user/login");
        assert_eq!(key.to_string(), "user/login");
    }

    #[test]
    fn request_frame_survives_the_wire() {
        let frame = RequestFrame {
            timeout_ms: Some(3_000),
            request: Request::new("hello", "world")
                .with_param("name", "bob")
                .with_header("lang", "en")
                .with_file("avatar", vec![1, 2, 3]),
        };
        let bytes = frame.to_bytes().expect("encode frame");
        let (decoded, used) = RequestFrame::from_bytes(&bytes).expect("decode frame");
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn truncated_frame_is_a_decode_error() {
        let bytes = ReplyFrame::Status {
            code: STATUS_NOT_FOUND,
            message: "route foo/bar not found".into(),
        }
        .to_bytes()
        .expect("encode frame");
        assert!(ReplyFrame::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn forged_collection_length_hits_the_decode_limit() {
        let bytes = crate::server::test_util::forged_params_frame();
        let err = RequestFrame::from_bytes(&bytes).expect_err("length exceeds limit");
        assert!(matches!(err, DecodeError::LimitExceeded), "unexpected error: {err:?}");
    }
}
