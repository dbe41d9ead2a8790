use common::channel::Channel;
use common::payload::UserInfo;
use sea_orm::EntityTrait;

use crate::auth::claims::AuthUser;
use db::models::tickets::Model as TicketModel;
use db::models::user::Entity as UserEntity;

/// Result type that lets the caller send a specific reason back to the client.
///
/// A grant carries the minimal identity descriptor shared with channel peers
/// for presence; a denial leaks nothing but a reason code.
pub enum ChannelAccess {
    Granted(UserInfo),
    Denied(&'static str),
}

impl ChannelAccess {
    #[inline]
    pub fn is_granted(&self) -> bool {
        matches!(self, ChannelAccess::Granted(_))
    }
}

/// Main authorization entrypoint, evaluated on every subscribe frame.
///
/// Never cached across frames: ticket ownership and assignment can change
/// between calls. Fail-closed on any DB error / missing linkage.
pub async fn authorize_channel(
    db: &sea_orm::DatabaseConnection,
    user: &AuthUser,
    channel_name: &str,
) -> ChannelAccess {
    let Some(channel) = Channel::parse(channel_name) else {
        return ChannelAccess::Denied("unknown_channel");
    };

    match channel {
        // Ticket chat: owner OR admin.
        Channel::TicketChat { ticket_id } => {
            match TicketModel::owner_and_assignee(db, ticket_id).await {
                Some((owner_id, _assigned_admin_id)) => {
                    if user.0.admin || user.0.sub == owner_id {
                        grant(db, user.0.sub).await
                    } else {
                        ChannelAccess::Denied("not_allowed_for_ticket")
                    }
                }
                None => ChannelAccess::Denied("ticket_not_found"),
            }
        }
    }
}

/// Builds the peer descriptor for an authorized user. A user row that has
/// vanished since the token was issued is a denial, not a panic.
async fn grant(db: &sea_orm::DatabaseConnection, user_id: i64) -> ChannelAccess {
    match UserEntity::find_by_id(user_id).one(db).await {
        Ok(Some(u)) => ChannelAccess::Granted(UserInfo {
            id: u.id,
            name: u.name,
            role: u.role.to_string(),
        }),
        _ => ChannelAccess::Denied("user_not_found"),
    }
}
