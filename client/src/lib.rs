//! Client side of the realtime chat path.
//!
//! [`RealtimeClient`] owns the process-wide connection to the realtime
//! endpoint and all per-channel subscription bookkeeping; [`ChatSession`]
//! composes it with the HTTP [`ChatApi`] to produce one consistent,
//! deduplicated message timeline per ticket.
//!
//! Construct one `RealtimeClient` when the user logs in, share it (it is
//! cheaply cloneable) across sessions, and call
//! [`RealtimeClient::disconnect`] on logout.

pub mod api;
pub mod credentials;
pub mod error;
pub mod realtime;
pub mod session;
pub mod timeline;

pub use api::{ChatApi, HttpChatApi};
pub use error::{ApiError, ChatError, RealtimeError};
pub use realtime::{Binding, ConnectionState, RealtimeClient};
pub use session::ChatSession;
pub use timeline::{Timeline, TimelineEntry};
