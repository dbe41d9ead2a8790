use common::channel::Channel;
use serde::Serialize;

/// An event knows its stable name, the channel it belongs to, and which user
/// produced it (for the sender-echo delivery policy).
pub trait Event: Serialize {
    const NAME: &'static str;

    /// The channel this event is broadcast on.
    fn channel(&self) -> Channel;

    /// The originating user, if the event has one.
    fn sender_id(&self) -> Option<i64> {
        None
    }
}
