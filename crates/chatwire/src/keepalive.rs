//! Keepalive scheduling.
//!
//! Once logged in, the client sends `PING` every `ping_interval` seconds
//! (announced by the server in the login response). After each ping the
//! server has `pong_timeout` seconds to send *something*; any inbound
//! frame counts, not just `PONG`. If it stays silent the connection is
//! considered dead.
//!
//! ```text
//!   authenticated
//!        │  next_ping = now + interval
//!        ▼
//!   ──── ping due ──→ send PING ──→ pong_deadline = now + pong_timeout
//!        ▲                               │
//!        │                  inbound frame│      deadline passes
//!        └──── pong_deadline = None ◄────┘──────────→ PongOverdue
//! ```
//!
//! Like a tick scheduler, this holds deadlines rather than timers: the
//! engine awaits [`Keepalive::wait`] in its input loop, and
//! [`Keepalive::due`] answers the same question without waiting.

use std::time::Duration;

use tokio::time::{self, Instant};

/// Longest ping interval or pong timeout honored. The server picks both,
/// so larger values are cut to this.
pub(crate) const MAX_KEEPALIVE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// What the keepalive needs done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeepaliveDue {
    /// Time to send a `PING`.
    Ping,
    /// A ping went unanswered for longer than the pong timeout.
    PongOverdue,
}

#[derive(Debug, Default)]
pub(crate) struct Keepalive {
    interval: Duration,
    pong_timeout: Duration,
    next_ping: Option<Instant>,
    pong_deadline: Option<Instant>,
    pings_sent: u64,
}

impl Keepalive {
    /// Schedules the first ping one interval from now.
    ///
    /// A zero interval leaves the keepalive stopped. Both durations are
    /// capped at [`MAX_KEEPALIVE_PERIOD`].
    pub(crate) fn start(&mut self, interval: Duration, pong_timeout: Duration) {
        self.stop();
        if interval.is_zero() {
            tracing::debug!("server disabled keepalive (ping interval 0)");
            return;
        }
        if interval > MAX_KEEPALIVE_PERIOD || pong_timeout > MAX_KEEPALIVE_PERIOD {
            tracing::warn!(?interval, ?pong_timeout, "server keepalive timing too long, capping");
        }
        let interval = interval.min(MAX_KEEPALIVE_PERIOD);
        let pong_timeout = pong_timeout.min(MAX_KEEPALIVE_PERIOD);
        self.interval = interval;
        self.pong_timeout = pong_timeout;
        self.next_ping = Some(Instant::now() + interval);
        tracing::debug!(?interval, ?pong_timeout, "keepalive started");
    }

    pub(crate) fn stop(&mut self) {
        self.next_ping = None;
        self.pong_deadline = None;
        self.pings_sent = 0;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.next_ping.is_some()
    }

    /// Sequence number for the next ping's payload.
    pub(crate) fn next_seq(&self) -> u64 {
        self.pings_sent + 1
    }

    /// Records that a ping went out at `now`.
    ///
    /// An unanswered earlier ping keeps its (earlier) deadline.
    pub(crate) fn on_ping_sent(&mut self, now: Instant) {
        if !self.is_running() {
            return;
        }
        self.pings_sent += 1;
        self.next_ping = Some(now + self.interval);
        if self.pong_deadline.is_none() {
            self.pong_deadline = Some(now + self.pong_timeout);
        }
    }

    /// Any inbound frame proves the server is alive.
    pub(crate) fn on_inbound(&mut self) {
        self.pong_deadline = None;
    }

    /// What is due at `now`, if anything. An overdue pong wins over a
    /// due ping.
    pub(crate) fn due(&self, now: Instant) -> Option<KeepaliveDue> {
        if self.pong_deadline.is_some_and(|deadline| deadline <= now) {
            return Some(KeepaliveDue::PongOverdue);
        }
        if self.next_ping.is_some_and(|deadline| deadline <= now) {
            return Some(KeepaliveDue::Ping);
        }
        None
    }

    /// Waits until something is due. Pends forever while stopped.
    pub(crate) async fn wait(&self) -> KeepaliveDue {
        let (deadline, due) = match (self.pong_deadline, self.next_ping) {
            (Some(pong), Some(ping)) if pong <= ping => (pong, KeepaliveDue::PongOverdue),
            (_, Some(ping)) => (ping, KeepaliveDue::Ping),
            (Some(pong), None) => (pong, KeepaliveDue::PongOverdue),
            (None, None) => std::future::pending().await,
        };
        time::sleep_until(deadline).await;
        due
    }
}
