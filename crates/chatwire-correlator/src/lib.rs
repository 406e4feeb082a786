//! Request correlation for Chatwire.
//!
//! The server answers some commands asynchronously, echoing the
//! `req_id` the client attached. This crate keeps track of who is waiting
//! for which id:
//!
//! - [`RequestIdGenerator`] hands out ids that are never reused.
//! - [`RequestCorrelator`] holds the pending table, resolves entries on
//!   acknowledgement, timeout or cancellation, and runs per-request timers.
//! - [`PendingHandle`] is the caller's future for one entry.

mod correlator;
mod error;
mod request_id;

pub use correlator::{Completion, ExpiredReceiver, MAX_TIMEOUT, PendingHandle, RequestCorrelator};
pub use error::CorrelatorError;
pub use request_id::RequestIdGenerator;
