use thiserror::Error;

/// Failures of the realtime connection and subscription machinery.
///
/// Everything here is recoverable: the caller may retry, reconnect, or fall
/// back to plain history fetches. Nothing is fatal to the process.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// No usable credential; `initialize` aborts without touching state.
    #[error("credential missing or invalid: {0}")]
    Credential(String),

    /// The channel references a ticket that does not exist.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// The server refused the subscription for this identity.
    #[error("not authorized for channel {channel}: {reason}")]
    Unauthorized { channel: String, reason: String },

    /// Connection-level failure. Surfaces as connection state `Error`; no
    /// automatic retry happens here, the caller decides.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failures of the HTTP chat endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered, but with a refusal.
    #[error("server rejected request: {0}")]
    Rejected(String),
}

/// Failures surfaced by a [`ChatSession`](crate::ChatSession).
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message body must not be empty")]
    EmptyMessage,

    /// Persisting a new message failed; the optimistic placeholder has been
    /// rolled back. Not retried automatically to avoid duplicate sends.
    #[error("failed to send message: {0}")]
    Send(#[source] ApiError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}
