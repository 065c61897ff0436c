//! Errors returned by pooled client calls.

use std::{io, time::Duration};

/// Errors emitted by [`Caller`](super::Caller) and the connection pool.
///
/// Every variant except [`ClientError::Remote`] means the transport can no
/// longer be trusted, and the connection involved is invalidated.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Connecting to the destination failed.
    #[error("failed to dial {address}: {source}")]
    Dial {
        /// Destination that could not be reached.
        address: String,
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing a frame failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The call did not complete before its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    /// Failed to serialize an outbound frame.
    #[error("failed to encode request frame")]
    Encode(#[source] bincode::error::EncodeError),
    /// Failed to deserialize an inbound frame.
    #[error("failed to decode reply frame")]
    Decode(#[source] bincode::error::DecodeError),
    /// The peer closed the connection before replying.
    #[error("connection closed by peer")]
    Disconnected,
    /// The server answered with a status instead of running a handler.
    #[error("remote status {code}: {message}")]
    Remote {
        /// Status code, for example `404` for an unknown route.
        code: i32,
        /// Reason given by the server.
        message: String,
    },
}

impl ClientError {
    /// Whether the error leaves the connection in an unknown state.
    ///
    /// # Examples
    ///
    /// ```
    /// use endrpc::client::ClientError;
    ///
    /// assert!(ClientError::Disconnected.is_transport());
    /// assert!(
    ///     !ClientError::Remote {
    ///         code: 404,
    ///         message: "no route".into(),
    ///     }
    ///     .is_transport()
    /// );
    /// ```
    #[must_use]
    pub fn is_transport(&self) -> bool { !matches!(self, Self::Remote { .. }) }

    /// Status code of a [`ClientError::Remote`] error.
    #[must_use]
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}
