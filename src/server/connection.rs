//! Per-connection request loop.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use futures::{FutureExt, SinkExt, StreamExt};
use log::{error, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    select,
    time::Instant,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    codec::{FramedStream, decode_frame, encode_frame, framed},
    dispatcher::Dispatcher,
    message::{ReplyFrame, RequestFrame, STATUS_BAD_REQUEST},
    metrics,
};

/// Spawn a task serving one TCP connection, logging and discarding any
/// panic so that other connections are unaffected.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    max_frame_length: usize,
    shutdown: CancellationToken,
    tracker: &TaskTracker,
) {
    metrics::inc_connections();
    tracker.spawn(async move {
        let fut = std::panic::AssertUnwindSafe(serve_connection(
            stream,
            &dispatcher,
            max_frame_length,
            shutdown,
        ))
        .catch_unwind();

        match fut.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("connection error: error={e}, peer_addr={peer_addr}"),
            Err(panic) => {
                let panic_msg = panic_message(panic.as_ref());
                error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr}");
                tracing::error!(panic = %panic_msg, %peer_addr, "connection task panicked");
            }
        }
        metrics::dec_connections();
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_owned()))
        .unwrap_or_else(|| format!("{payload:?}"))
}

/// Answer frames from `io` until the peer hangs up, a malformed frame
/// arrives, or `shutdown` is cancelled between calls.
pub(super) async fn serve_connection<T>(
    io: T,
    dispatcher: &Dispatcher,
    max_frame_length: usize,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = framed(io, max_frame_length);
    loop {
        let payload = select! {
            biased;

            () = shutdown.cancelled() => return Ok(()),
            next = framed.next() => match next {
                Some(payload) => payload?,
                None => return Ok(()),
            },
        };

        let frame = match decode_frame::<RequestFrame>(&payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("malformed request frame: error={e}");
                let status = ReplyFrame::Status {
                    code: STATUS_BAD_REQUEST,
                    message: format!("malformed request frame: {e}"),
                };
                return send(&mut framed, &status).await;
            }
        };
        let reply = answer(dispatcher, frame);
        send(&mut framed, &reply).await?;
    }
}

fn answer(dispatcher: &Dispatcher, frame: RequestFrame) -> ReplyFrame {
    let deadline = frame
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    match dispatcher.do_request_with_deadline(frame.request, deadline) {
        Ok(reply) => ReplyFrame::Reply(reply),
        Err(e) => ReplyFrame::Status {
            code: e.status_code(),
            message: e.to_string(),
        },
    }
}

async fn send<T>(framed: &mut FramedStream<T>, reply: &ReplyFrame) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let bytes = encode_frame(reply).map_err(io::Error::other)?;
    framed.send(bytes).await
}
