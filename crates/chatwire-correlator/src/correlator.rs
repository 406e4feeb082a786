//! The pending-request table.
//!
//! Every ack-requiring command gets an entry here before it is sent. The
//! entry holds the sending half of a oneshot channel; the caller holds a
//! [`PendingHandle`] wrapping the receiving half. Exactly one of three
//! things eventually resolves the entry:
//!
//! ```text
//!            register()
//!                │
//!                ▼
//!           [pending] ──complete()──→ Acked(payload)
//!                │ └────timeout_one()──→ TimedOut
//!                └──cancel_one() / cancel_all()──→ Canceled
//! ```
//!
//! Removal from the table and resolution are two separate steps: the
//! entry is taken out under the lock, and the oneshot is fired after the
//! lock is released, so a caller woken by the resolution can never
//! re-enter the correlator while the table is locked.
//!
//! # Timers
//!
//! Each entry has a timer task. The timer does NOT touch the table when
//! it fires. It posts the request id to the `expired` channel, and the
//! owner (the engine) calls [`RequestCorrelator::timeout_one`] from its own
//! logical thread. A timer that fires after its entry was completed posts
//! an id that is no longer in the table, and `timeout_one` ignores it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::CorrelatorError;

/// Longest timeout a request can wait. Longer timeouts are cut to this.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Receives ids of requests whose timer fired.
pub type ExpiredReceiver = mpsc::UnboundedReceiver<String>;

/// How a pending request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The server acknowledged it; carries the acknowledgement's JSON.
    Acked(String),
    /// No acknowledgement arrived in time. A normal outcome, not a fault.
    TimedOut,
    /// The request was abandoned: disconnect, send failure, or teardown.
    Canceled,
}

impl Completion {
    /// The acknowledgement payload, or `None` for timeouts and cancels.
    pub fn into_payload(self) -> Option<String> {
        match self {
            Completion::Acked(payload) => Some(payload),
            Completion::TimedOut | Completion::Canceled => None,
        }
    }
}

/// The caller's side of a pending request.
///
/// Await it to get the [`Completion`]. If the correlator is dropped
/// without resolving the entry, the handle resolves to
/// [`Completion::Canceled`], so it can never hang.
#[derive(Debug)]
pub struct PendingHandle {
    request_id: String,
    rx: oneshot::Receiver<Completion>,
}

impl PendingHandle {
    /// The id this handle is waiting on.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Future for PendingHandle {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Completion::Canceled))
    }
}

/// One outstanding request.
struct PendingRequest {
    resolve: oneshot::Sender<Completion>,
    timer: AbortHandle,
}

impl PendingRequest {
    fn finish(self, completion: Completion) {
        self.timer.abort();
        // The caller may have stopped waiting; that's fine.
        let _ = self.resolve.send(completion);
    }
}

/// Matches acknowledgements to the requests waiting for them.
///
/// Thread-safe: all table mutations serialize on one mutex. Requires a
/// Tokio runtime for [`register`](Self::register), which spawns the
/// per-request timer.
pub struct RequestCorrelator {
    pending: Mutex<HashMap<String, PendingRequest>>,
    expired: mpsc::UnboundedSender<String>,
}

impl RequestCorrelator {
    /// Creates a correlator whose timers report to `expired`.
    pub fn new(expired: mpsc::UnboundedSender<String>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            expired,
        }
    }

    /// Creates a correlator together with the receiver its timers post to.
    pub fn channel() -> (Self, ExpiredReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        // A panic while holding the lock cannot leave the map half-updated
        // (every mutation is a single insert/remove), so poison is safe to
        // ignore.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a pending request and starts its timer.
    ///
    /// `timeout` is capped at [`MAX_TIMEOUT`].
    ///
    /// # Errors
    /// Returns [`CorrelatorError::DuplicateRequestId`] if `request_id` is
    /// already pending.
    pub fn register(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<PendingHandle, CorrelatorError> {
        let mut table = self.table();
        if table.contains_key(request_id) {
            return Err(CorrelatorError::DuplicateRequestId(request_id.to_owned()));
        }

        let (resolve, rx) = oneshot::channel();
        let timeout = timeout.min(MAX_TIMEOUT);
        let deadline = Instant::now() + timeout;
        let expired = self.expired.clone();
        let timer_id = request_id.to_owned();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = expired.send(timer_id);
        })
        .abort_handle();

        table.insert(
            request_id.to_owned(),
            PendingRequest {
                resolve,
                timer,
            },
        );
        tracing::trace!(request_id, ?timeout, pending = table.len(), "request registered");

        Ok(PendingHandle {
            request_id: request_id.to_owned(),
            rx,
        })
    }

    fn take(&self, request_id: &str) -> Option<PendingRequest> {
        self.table().remove(request_id)
    }

    /// Resolves a pending request with its acknowledgement payload.
    ///
    /// Returns `true` if the id was pending. A second call for the same id
    /// returns `false` and does nothing, which makes duplicate
    /// acknowledgements harmless.
    pub fn complete(&self, request_id: &str, payload: String) -> bool {
        match self.take(request_id) {
            Some(request) => {
                tracing::debug!(request_id, "request acknowledged");
                request.finish(Completion::Acked(payload));
                true
            }
            None => false,
        }
    }

    /// Resolves a pending request as timed out.
    ///
    /// Called when the request's timer fires. Returns `false` if the
    /// request already finished.
    pub fn timeout_one(&self, request_id: &str) -> bool {
        match self.take(request_id) {
            Some(request) => {
                tracing::debug!(request_id, "request timed out");
                request.finish(Completion::TimedOut);
                true
            }
            None => false,
        }
    }

    /// Resolves one pending request as canceled.
    pub fn cancel_one(&self, request_id: &str) -> bool {
        match self.take(request_id) {
            Some(request) => {
                request.finish(Completion::Canceled);
                true
            }
            None => false,
        }
    }

    /// Resolves every pending request as canceled and stops their timers.
    ///
    /// Returns how many requests were canceled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut table = self.table();
            table.drain().map(|(_, request)| request).collect()
        };
        let count = drained.len();
        for request in drained {
            request.finish(Completion::Canceled);
        }
        if count > 0 {
            tracing::debug!(count, "canceled pending requests");
        }
        count
    }

    /// Whether `request_id` is still waiting.
    pub fn contains(&self, request_id: &str) -> bool {
        self.table().contains_key(request_id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

impl Drop for RequestCorrelator {
    fn drop(&mut self) {
        // Dropping the senders resolves every handle as Canceled; only the
        // timers need stopping.
        for request in self.table().values() {
            request.timer.abort();
        }
    }
}
