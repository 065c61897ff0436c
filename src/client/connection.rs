//! Transport seam between the pool and the network.
//!
//! [`Dialer`] opens connections to an address and [`Connection`] performs a
//! single request/reply exchange. The pool only relies on these traits, which
//! lets tests substitute an in-memory double for the TCP implementation.

use std::io;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, time::timeout};

use super::{ClientConfig, ClientError};
use crate::{
    codec::{FramedStream, decode_frame, encode_frame, framed},
    message::{ReplyFrame, RequestFrame},
};

/// A live channel to one destination address.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Destination this connection was dialed for.
    fn address(&self) -> &str;

    /// Whether the connection can be reused for another call.
    ///
    /// A connection whose last exchange failed or was interrupted reports
    /// `false`.
    fn is_healthy(&self) -> bool;

    /// Send `frame` and wait for the matching reply.
    ///
    /// # Errors
    ///
    /// Returns a transport [`ClientError`] when the exchange fails. The
    /// connection is unhealthy afterwards.
    async fn invoke(&mut self, frame: &RequestFrame) -> Result<ReplyFrame, ClientError>;
}

/// Factory for [`Connection`]s.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Connection type produced by this dialer.
    type Connection: Connection;

    /// Open a new connection to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Dial`] when the destination cannot be reached.
    async fn dial(&self, address: &str) -> Result<Self::Connection, ClientError>;
}

/// Dials plain TCP connections using length-prefixed bincode frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpDialer {
    config: ClientConfig,
}

impl TcpDialer {
    /// Create a dialer honouring the connect timeout, `TCP_NODELAY` and
    /// frame limit in `config`.
    #[must_use]
    pub const fn new(config: ClientConfig) -> Self { Self { config } }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Connection = TcpConnection;

    async fn dial(&self, address: &str) -> Result<TcpConnection, ClientError> {
        let dial_error = |source: io::Error| ClientError::Dial {
            address: address.to_owned(),
            source,
        };
        let stream = timeout(self.config.dial_timeout_value(), TcpStream::connect(address))
            .await
            .map_err(|_| dial_error(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")))?
            .map_err(dial_error)?;
        stream
            .set_nodelay(self.config.nodelay_value())
            .map_err(dial_error)?;
        tracing::debug!(address, "dialed connection");
        Ok(TcpConnection {
            address: address.to_owned(),
            framed: framed(stream, self.config.max_frame_length_value()),
            healthy: true,
        })
    }
}

/// A framed TCP connection produced by [`TcpDialer`].
#[derive(Debug)]
pub struct TcpConnection {
    address: String,
    framed: FramedStream<TcpStream>,
    healthy: bool,
}

impl TcpConnection {
    async fn round_trip(&mut self, frame: &RequestFrame) -> Result<ReplyFrame, ClientError> {
        let bytes = encode_frame(frame).map_err(ClientError::Encode)?;
        self.framed.send(bytes).await?;
        let payload = self.framed.next().await.ok_or(ClientError::Disconnected)??;
        decode_frame(&payload).map_err(ClientError::Decode)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn address(&self) -> &str { &self.address }

    fn is_healthy(&self) -> bool { self.healthy }

    async fn invoke(&mut self, frame: &RequestFrame) -> Result<ReplyFrame, ClientError> {
        // Stays unhealthy if this future is dropped mid-exchange.
        self.healthy = false;
        let result = self.round_trip(frame).await;
        self.healthy = result.is_ok();
        result
    }
}

#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        codec::DEFAULT_MAX_FRAME_LENGTH,
        message::{Reply, Request},
    };

    async fn reply_once(listener: TcpListener, reply: Option<ReplyFrame>) {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut server = framed(stream, DEFAULT_MAX_FRAME_LENGTH);
        let payload = server.next().await.expect("frame").expect("read");
        let _: RequestFrame = decode_frame(&payload).expect("decode request");
        if let Some(reply) = reply {
            server
                .send(encode_frame(&reply).expect("encode reply"))
                .await
                .expect("send reply");
        }
    }

    fn frame() -> RequestFrame {
        RequestFrame {
            timeout_ms: Some(1000),
            request: Request::new("hello", "world"),
        }
    }

    #[tokio::test]
    async fn tcp_connection_round_trips_a_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        let expected = ReplyFrame::Reply(Reply { data: b"{}".to_vec() });
        let server = tokio::spawn(reply_once(listener, Some(expected.clone())));

        let mut conn = TcpDialer::default().dial(&address).await.expect("dial");
        assert_eq!(conn.address(), address);
        let reply = conn.invoke(&frame()).await.expect("invoke");
        assert_eq!(reply, expected);
        assert!(conn.is_healthy());
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn closed_peer_marks_connection_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        let server = tokio::spawn(reply_once(listener, None));

        let mut conn = TcpDialer::default().dial(&address).await.expect("dial");
        let err = conn.invoke(&frame()).await.expect_err("peer hung up");
        assert!(err.is_transport());
        assert!(!conn.is_healthy());
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn dial_failure_reports_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let err = TcpDialer::default()
            .dial(&address)
            .await
            .expect_err("nothing listening");
        assert!(matches!(err, ClientError::Dial { address: ref a, .. } if *a == address));
    }
}
