use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

/// One persisted chat message in a ticket's conversation.
///
/// Immutable once created, except for the `is_read` transition false -> true.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub ticket_id: i64,
    pub user_id: i64,

    pub message: String,
    pub is_read: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tickets::Entity",
        from = "Column::TicketId",
        to = "super::tickets::Column::Id"
    )]
    Ticket,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DbConn,
        ticket_id: i64,
        user_id: i64,
        message: &str,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();

        let active = ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(user_id),
            message: Set(message.to_owned()),
            is_read: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active.insert(db).await
    }

    /// Conversation history, ascending by creation time.
    pub async fn find_all_for_ticket(db: &DbConn, ticket_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::TicketId.eq(ticket_id))
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await
    }

    /// Marks every unread message on the ticket as read, excluding those the
    /// reader authored. Returns the number of rows affected.
    pub async fn mark_read_excluding(
        db: &DbConn,
        ticket_id: i64,
        exclude_user_id: i64,
    ) -> Result<u64, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::TicketId.eq(ticket_id))
            .filter(Column::UserId.ne(exclude_user_id))
            .filter(Column::IsRead.eq(false))
            .exec(db)
            .await?;

        Ok(res.rows_affected)
    }
}
