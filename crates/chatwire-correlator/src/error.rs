/// Errors that can occur while registering a pending request.
#[derive(Debug, thiserror::Error)]
pub enum CorrelatorError {
    /// A request with this id is already waiting for its acknowledgement.
    ///
    /// Ids come from [`RequestIdGenerator`](crate::RequestIdGenerator), so
    /// hitting this means the engine reused an id: a logic bug.
    #[error("request id {0} is already pending")]
    DuplicateRequestId(String),
}
