//! Resolved payload shapes shared by HTTP responses and broadcast events.
//!
//! A chat message always travels fully resolved: flat message fields plus an
//! embedded sender descriptor, never a bare relation id that would force a
//! follow-up fetch. Normalization of a missing sender happens here, once, at
//! the contract boundary.

use serde::{Deserialize, Serialize};

/// Role strings as they appear on the wire.
pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_ADMIN: &str = "admin";

/// Minimal identity descriptor: what channel peers may learn about each other,
/// and what the authorizer releases on grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub role: String,
}

impl UserInfo {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Full sender descriptor embedded in a chat message payload.
///
/// `email` and the timestamps are absent on a synthesized descriptor (a live
/// event whose sender relation was missing); they are always present on
/// server-built payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UserPayload {
    /// Fallback descriptor for a message whose sender relation is missing,
    /// so consumers never render an undefined user.
    pub fn unknown(user_id: i64) -> Self {
        Self {
            id: user_id,
            name: "Unknown User".to_string(),
            email: None,
            role: ROLE_CUSTOMER.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

impl From<UserInfo> for UserPayload {
    fn from(info: UserInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            email: None,
            role: info.role,
            created_at: None,
            updated_at: None,
        }
    }
}

/// The one chat message contract: returned from history and send endpoints
/// and carried verbatim inside the `new.chat.message` event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub id: i64,
    pub message: String,
    pub ticket_id: i64,
    pub user_id: i64,
    pub is_read: bool,
    pub created_at: String, // RFC3339
    pub updated_at: String, // RFC3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPayload>,
}

impl ChatMessagePayload {
    /// Guarantees an embedded sender descriptor, synthesizing one from
    /// `user_id` when the relation was not resolved upstream.
    pub fn ensure_sender(&mut self) {
        if self.user.is_none() {
            self.user = Some(UserPayload::unknown(self.user_id));
        }
    }

    /// The sender descriptor, synthesized if missing.
    pub fn sender(&self) -> UserPayload {
        self.user
            .clone()
            .unwrap_or_else(|| UserPayload::unknown(self.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_payload() -> ChatMessagePayload {
        ChatMessagePayload {
            id: 7,
            message: "need help".into(),
            ticket_id: 42,
            user_id: 3,
            is_read: false,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
            user: None,
        }
    }

    #[test]
    fn ensure_sender_synthesizes_a_descriptor() {
        let mut p = bare_payload();
        p.ensure_sender();
        let user = p.user.expect("sender present");
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "Unknown User");
        assert_eq!(user.role, ROLE_CUSTOMER);
    }

    #[test]
    fn ensure_sender_keeps_an_existing_descriptor() {
        let mut p = bare_payload();
        p.user = Some(UserPayload {
            id: 3,
            name: "Amira".into(),
            email: Some("amira@example.com".into()),
            role: ROLE_ADMIN.into(),
            created_at: None,
            updated_at: None,
        });
        p.ensure_sender();
        assert_eq!(p.user.unwrap().name, "Amira");
    }

    #[test]
    fn payload_deserializes_without_user_field() {
        let wire = r#"{
            "id": 1, "message": "hi", "ticket_id": 2, "user_id": 3,
            "is_read": false,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let p: ChatMessagePayload = serde_json::from_str(wire).unwrap();
        assert!(p.user.is_none());
        assert_eq!(p.sender().id, 3);
    }
}
