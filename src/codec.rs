//! Length-prefixed framing shared by the server and the client.
//!
//! Every frame on the wire is a big-endian `u32` length followed by a
//! bincode-encoded [`Message`]. Frames longer than the configured maximum are
//! rejected by the decoder with an I/O error.

use bincode::error::{DecodeError, EncodeError};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::message::Message;

/// Default upper bound on a single frame, in bytes (4 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// A byte stream split into length-prefixed frames.
pub type FramedStream<T> = Framed<T, LengthDelimitedCodec>;

/// Wrap `io` in a length-delimited codec accepting frames of up to
/// `max_frame_length` bytes.
///
/// # Examples
///
/// ```
/// use endrpc::codec::{DEFAULT_MAX_FRAME_LENGTH, framed};
///
/// let (client, _server) = tokio::io::duplex(64);
/// let framed = framed(client, DEFAULT_MAX_FRAME_LENGTH);
/// assert_eq!(framed.codec().max_frame_length(), DEFAULT_MAX_FRAME_LENGTH);
/// ```
pub fn framed<T>(io: T, max_frame_length: usize) -> FramedStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_length)
        .new_codec();
    Framed::new(io, codec)
}

/// Serialize `message` into a frame payload.
///
/// # Errors
///
/// Returns an [`EncodeError`] if bincode cannot encode the message.
pub fn encode_frame<M: Message>(message: &M) -> Result<Bytes, EncodeError> {
    message.to_bytes().map(Bytes::from)
}

/// Deserialize a frame payload, rejecting trailing bytes.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the payload is malformed or longer than the
/// encoded message.
pub fn decode_frame<M: Message>(payload: &[u8]) -> Result<M, DecodeError> {
    let (message, consumed) = M::from_bytes(payload)?;
    if consumed != payload.len() {
        return Err(DecodeError::OtherString(format!(
            "{} trailing bytes after frame",
            payload.len() - consumed
        )));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use tokio::io::{AsyncWriteExt, duplex};

    use super::*;
    use crate::message::{Request, RequestFrame};

    #[tokio::test]
    async fn frames_cross_a_stream_intact() {
        let (client, server) = duplex(1024);
        let mut tx = framed(client, DEFAULT_MAX_FRAME_LENGTH);
        let mut rx = framed(server, DEFAULT_MAX_FRAME_LENGTH);

        let sent = RequestFrame {
            timeout_ms: Some(250),
            request: Request::new("hello", "world").with_param("name", "bob"),
        };
        tx.send(encode_frame(&sent).expect("encode"))
            .await
            .expect("send");
        let payload = rx.next().await.expect("frame").expect("read");
        let received: RequestFrame = decode_frame(&payload).expect("decode");
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut client, server) = duplex(1024);
        let mut rx = framed(server, 16);
        client.write_u32(17).await.expect("write length");
        client.write_all(&[0; 17]).await.expect("write body");

        let err = rx.next().await.expect("item").expect_err("too long");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn trailing_bytes_are_an_error() {
        let mut payload = encode_frame(&Request::new("a", "b"))
            .expect("encode")
            .to_vec();
        payload.push(0);
        assert!(decode_frame::<Request>(&payload).is_err());
    }
}
