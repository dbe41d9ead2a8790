//! Conversation channel naming.
//!
//! A channel identifies one ticket's chat stream. Channel identity is a pure
//! function of the ticket id (`ticket_{id}`), so there is no allocation step
//! and the mapping is injective across tickets.

use std::fmt;

const TICKET_PREFIX: &str = "ticket_";

/// A structured channel identity. Parsing and naming round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    TicketChat { ticket_id: i64 },
}

impl Channel {
    pub fn ticket(ticket_id: i64) -> Self {
        Channel::TicketChat { ticket_id }
    }

    /// Canonical wire name, e.g. `ticket_42`.
    pub fn name(&self) -> String {
        match *self {
            Channel::TicketChat { ticket_id } => format!("{TICKET_PREFIX}{ticket_id}"),
        }
    }

    /// Parses a wire name back into a structured channel.
    ///
    /// Only positive ticket ids are valid; anything else is not a channel.
    pub fn parse(name: &str) -> Option<Channel> {
        let rest = name.strip_prefix(TICKET_PREFIX)?;
        let ticket_id: i64 = rest.parse().ok()?;
        (ticket_id > 0).then_some(Channel::TicketChat { ticket_id })
    }

    pub fn ticket_id(&self) -> i64 {
        match *self {
            Channel::TicketChat { ticket_id } => ticket_id,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
