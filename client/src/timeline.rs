//! The message timeline: one consistent, deduplicated list per ticket.
//!
//! Pure state with synchronous operations; all async plumbing lives in
//! [`ChatSession`](crate::ChatSession). Three sources feed it: the history
//! baseline, optimistic local sends, and live broadcast events. Event
//! delivery order is not guaranteed to match persistence order, so merging
//! relies on id- and content-based deduplication, never on arrival order.

use common::payload::{ChatMessagePayload, UserInfo, UserPayload};

/// One rendered line of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    /// Server-assigned id; `None` while this is an optimistic placeholder.
    pub id: Option<i64>,
    /// Client-local id used to match a placeholder with its confirmation.
    pub local_id: Option<u64>,
    pub ticket_id: i64,
    pub message: String,
    pub user: UserPayload,
    pub is_read: bool,
    pub created_at: String,
    /// True until the server confirms (or rolls back) this entry.
    pub pending: bool,
}

impl TimelineEntry {
    fn from_payload(p: &ChatMessagePayload) -> Self {
        Self {
            id: Some(p.id),
            local_id: None,
            ticket_id: p.ticket_id,
            message: p.message.clone(),
            user: p.sender(),
            is_read: p.is_read,
            created_at: p.created_at.clone(),
            pending: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    next_local_id: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with the server history baseline. The server
    /// returns ascending `created_at` order; it is kept as-is.
    pub fn set_history(&mut self, history: Vec<ChatMessagePayload>) {
        self.entries = history.iter().map(TimelineEntry::from_payload).collect();
    }

    /// Appends an optimistic placeholder and returns its local id.
    pub fn push_pending(
        &mut self,
        ticket_id: i64,
        body: &str,
        me: &UserInfo,
        created_at: String,
    ) -> u64 {
        self.next_local_id += 1;
        let local_id = self.next_local_id;
        self.entries.push(TimelineEntry {
            id: None,
            local_id: Some(local_id),
            ticket_id,
            message: body.to_string(),
            user: UserPayload::from(me.clone()),
            is_read: false,
            created_at,
            pending: true,
        });
        local_id
    }

    /// Replaces the placeholder `local_id` with the server-confirmed message.
    ///
    /// If the placeholder is gone (rolled back by a concurrent path), the
    /// confirmation is merged through [`apply_event`](Self::apply_event)
    /// instead, so the message is never lost and never duplicated.
    pub fn confirm_pending(&mut self, local_id: u64, confirmed: &ChatMessagePayload) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.local_id == Some(local_id))
        {
            Some(entry) => *entry = TimelineEntry::from_payload(confirmed),
            None => {
                self.apply_event(confirmed);
            }
        }
    }

    /// Removes the placeholder `local_id` after a failed send. Returns
    /// whether anything was removed.
    pub fn remove_pending(&mut self, local_id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.local_id != Some(local_id));
        before != self.entries.len()
    }

    /// Merges a live event into the timeline. Returns true if appended.
    ///
    /// Precedence:
    /// 1. an entry with the same server id already exists → drop (idempotent)
    /// 2. a pending placeholder with the same body exists (the sender's own
    ///    echo racing its confirmation) → drop
    /// 3. otherwise append; no re-sorting, a brief local inversion is fine
    pub fn apply_event(&mut self, payload: &ChatMessagePayload) -> bool {
        if self.entries.iter().any(|e| e.id == Some(payload.id)) {
            return false;
        }
        if self
            .entries
            .iter()
            .any(|e| e.pending && e.message == payload.message)
        {
            return false;
        }
        self.entries.push(TimelineEntry::from_payload(payload));
        true
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<TimelineEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
