//! In-memory [`Dialer`] double for exercising pools and callers.
//!
//! [`ScriptedDialer`] hands out connections that answer from a shared script
//! and record how many connections exist and how many calls are in flight,
//! which lets tests assert on pool behaviour without sockets.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ClientError, Connection, Dialer};
use crate::{
    envelope,
    message::{Reply, ReplyFrame, RequestFrame},
};

/// Scripted outcome of one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Reply with these bytes.
    Reply(Vec<u8>),
    /// Reply with a status frame.
    Remote {
        /// Status code.
        code: i32,
        /// Status text.
        message: String,
    },
    /// Fail with [`ClientError::Disconnected`].
    Fail,
    /// Never answer.
    Hang,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<VecDeque<Step>>,
    delay: Mutex<Option<Duration>>,
    failing_dials: AtomicUsize,
    next_id: AtomicUsize,
    dials: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    invocations: Mutex<Vec<usize>>,
    frames: Mutex<Vec<RequestFrame>>,
}

/// Dialer producing [`ScriptedConnection`]s.
///
/// Clones share the same script and counters.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDialer {
    shared: Arc<Shared>,
}

impl ScriptedDialer {
    /// Create a dialer with an empty script. Calls with no scripted step
    /// reply with a success envelope wrapping the request parameters.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Delay every call by `delay` before answering.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.shared.delay.lock() = Some(delay);
        self
    }

    /// Queue the outcome of a future call.
    pub fn push(&self, step: Step) { self.shared.script.lock().push_back(step); }

    /// Make the next `count` dials fail.
    pub fn fail_next_dials(&self, count: usize) {
        self.shared.failing_dials.store(count, Ordering::SeqCst);
    }

    /// Successful dials so far.
    #[must_use]
    pub fn dials(&self) -> usize { self.shared.dials.load(Ordering::SeqCst) }

    /// Connections not yet dropped.
    #[must_use]
    pub fn live(&self) -> usize { self.shared.live.load(Ordering::SeqCst) }

    /// Highest number of simultaneously open connections.
    #[must_use]
    pub fn peak_live(&self) -> usize { self.shared.peak_live.load(Ordering::SeqCst) }

    /// Calls currently awaiting a reply.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.shared.in_flight.load(Ordering::SeqCst) }

    /// Highest number of simultaneous calls.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize { self.shared.peak_in_flight.load(Ordering::SeqCst) }

    /// Connection id used by each call, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<usize> { self.shared.invocations.lock().clone() }

    /// Every frame received, in call order.
    #[must_use]
    pub fn frames(&self) -> Vec<RequestFrame> { self.shared.frames.lock().clone() }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Connection = ScriptedConnection;

    async fn dial(&self, address: &str) -> Result<ScriptedConnection, ClientError> {
        let failing = self
            .shared
            .failing_dials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ClientError::Dial {
                address: address.to_owned(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "scripted dial failure"),
            });
        }
        let shared = &self.shared;
        shared.dials.fetch_add(1, Ordering::SeqCst);
        let live = shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak_live.fetch_max(live, Ordering::SeqCst);
        Ok(ScriptedConnection {
            id: shared.next_id.fetch_add(1, Ordering::SeqCst),
            address: address.to_owned(),
            healthy: true,
            shared: Arc::clone(shared),
        })
    }
}

/// Connection produced by [`ScriptedDialer`].
#[derive(Debug)]
pub struct ScriptedConnection {
    id: usize,
    address: String,
    healthy: bool,
    shared: Arc<Shared>,
}

impl ScriptedConnection {
    /// Identifier assigned at dial time, starting from zero.
    #[must_use]
    pub fn id(&self) -> usize { self.id }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) { self.shared.live.fetch_sub(1, Ordering::SeqCst); }
}

struct InFlight<'a>(&'a Shared);

impl<'a> InFlight<'a> {
    fn enter(shared: &'a Shared) -> Self {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) { self.0.in_flight.fetch_sub(1, Ordering::SeqCst); }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn address(&self) -> &str { &self.address }

    fn is_healthy(&self) -> bool { self.healthy }

    async fn invoke(&mut self, frame: &RequestFrame) -> Result<ReplyFrame, ClientError> {
        let shared = Arc::clone(&self.shared);
        let _guard = InFlight::enter(&shared);
        shared.invocations.lock().push(self.id);
        shared.frames.lock().push(frame.clone());
        self.healthy = false;

        let delay = *shared.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let step = shared.script.lock().pop_front();
        let reply = match step {
            Some(Step::Reply(data)) => ReplyFrame::Reply(Reply { data }),
            Some(Step::Remote { code, message }) => ReplyFrame::Status { code, message },
            Some(Step::Fail) => return Err(ClientError::Disconnected),
            Some(Step::Hang) => std::future::pending().await,
            None => ReplyFrame::Reply(Reply {
                data: envelope::encode_success(&frame.request.params).map_err(|e| {
                    ClientError::Io(io::Error::other(e))
                })?,
            }),
        };
        self.healthy = true;
        Ok(reply)
    }
}
