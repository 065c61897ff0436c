//! Frame-level client for protocol tests.

use std::io;

use bytes::Bytes;
use endrpc::{
    codec::{DEFAULT_MAX_FRAME_LENGTH, FramedStream, decode_frame, encode_frame, framed},
    message::{ReplyFrame, Request, RequestFrame},
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;

/// Single connection that sends frames exactly as told.
#[derive(Debug)]
pub struct RawClient {
    framed: FramedStream<TcpStream>,
}

impl RawClient {
    /// Connect to `addr`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while connecting.
    pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: framed(stream, DEFAULT_MAX_FRAME_LENGTH),
        })
    }

    /// Send `request` with an optional deadline and read the answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written, the server closes the
    /// connection or the answer does not decode.
    pub async fn call(&mut self, request: Request, timeout_ms: Option<u64>) -> io::Result<ReplyFrame> {
        let frame = RequestFrame {
            timeout_ms,
            request,
        };
        let payload = encode_frame(&frame).map_err(io::Error::other)?;
        self.send_raw(payload).await?;
        self.recv().await
    }

    /// Write `payload` as one frame without validating it.
    ///
    /// # Errors
    ///
    /// Returns any error raised while writing.
    pub async fn send_raw(&mut self, payload: impl Into<Bytes>) -> io::Result<()> {
        self.framed.send(payload.into()).await
    }

    /// Read and decode the next answer.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the server closed the
    /// connection.
    pub async fn recv(&mut self) -> io::Result<ReplyFrame> {
        let payload = self
            .framed
            .next()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))??;
        decode_frame(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Whether the server has closed the connection.
    pub async fn is_closed(&mut self) -> bool { matches!(self.framed.next().await, None | Some(Err(_))) }
}
