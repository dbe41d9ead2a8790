use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i64,
    pub assigned_admin_id: Option<i64>,

    pub subject: String,
    pub description: String,

    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_category")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TicketCategory {
    #[sea_orm(string_value = "technical")]
    Technical,

    #[sea_orm(string_value = "billing")]
    Billing,

    #[sea_orm(string_value = "general")]
    General,

    #[sea_orm(string_value = "support")]
    Support,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_priority")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TicketPriority {
    #[sea_orm(string_value = "low")]
    Low,

    #[sea_orm(string_value = "medium")]
    Medium,

    #[sea_orm(string_value = "high")]
    High,

    #[sea_orm(string_value = "urgent")]
    Urgent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_status")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TicketStatus {
    #[sea_orm(string_value = "open")]
    Open,

    #[sea_orm(string_value = "in_progress")]
    InProgress,

    #[sea_orm(string_value = "resolved")]
    Resolved,

    #[sea_orm(string_value = "closed")]
    Closed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedAdminId",
        to = "super::user::Column::Id"
    )]
    AssignedAdmin,
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
        user_id: i64,
        subject: &str,
        description: &str,
        category: TicketCategory,
        priority: TicketPriority,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();

        let active_model = ActiveModel {
            user_id: Set(user_id),
            assigned_admin_id: Set(None),
            subject: Set(subject.to_owned()),
            description: Set(description.to_owned()),
            category: Set(category),
            priority: Set(priority),
            status: Set(TicketStatus::Open),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    /// Scoped fetch: admins see any ticket, customers only their own.
    pub async fn find_for_user(
        db: &DbConn,
        ticket_id: i64,
        user_id: i64,
        user_is_admin: bool,
    ) -> Result<Option<Model>, DbErr> {
        let mut query = Entity::find().filter(Column::Id.eq(ticket_id));

        if !user_is_admin {
            query = query.filter(Column::UserId.eq(user_id));
        }

        query.one(db).await
    }

    /// Scoped listing, newest first.
    pub async fn list_for_user(
        db: &DbConn,
        user_id: i64,
        user_is_admin: bool,
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find().order_by_desc(Column::CreatedAt);

        if !user_is_admin {
            query = query.filter(Column::UserId.eq(user_id));
        }

        query.all(db).await
    }

    /// Column-only ownership lookup: returns `(owner_id, assigned_admin_id)`.
    ///
    /// `None` means the ticket does not exist. Used by the channel authorizer
    /// on every subscription attempt, so it stays a two-column select.
    pub async fn owner_and_assignee(
        db: &DbConn,
        ticket_id: i64,
    ) -> Option<(i64, Option<i64>)> {
        Entity::find()
            .select_only()
            .column(Column::UserId)
            .column(Column::AssignedAdminId)
            .filter(Column::Id.eq(ticket_id))
            .into_tuple::<(i64, Option<i64>)>()
            .one(db)
            .await
            .ok()?
    }

    pub async fn delete(db: &DbConn, ticket_id: i64) -> Result<(), DbErr> {
        Entity::delete_by_id(ticket_id).exec(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Model as UserModel, UserRole};
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn scoped_listing_hides_foreign_tickets() {
        let db = setup_test_db().await;
        let alice = UserModel::create(&db, "Alice", "a@test.com", "password123", UserRole::Customer)
            .await
            .unwrap();
        let bob = UserModel::create(&db, "Bob", "b@test.com", "password123", UserRole::Customer)
            .await
            .unwrap();

        let t = Model::create(
            &db,
            alice.id,
            "Printer on fire",
            "It is very much on fire",
            TicketCategory::Technical,
            TicketPriority::Urgent,
        )
        .await
        .unwrap();

        assert_eq!(Model::list_for_user(&db, alice.id, false).await.unwrap().len(), 1);
        assert!(Model::list_for_user(&db, bob.id, false).await.unwrap().is_empty());
        // admins see everything
        assert_eq!(Model::list_for_user(&db, bob.id, true).await.unwrap().len(), 1);

        assert!(Model::find_for_user(&db, t.id, bob.id, false).await.unwrap().is_none());
        assert!(Model::find_for_user(&db, t.id, bob.id, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn owner_and_assignee_lookup() {
        let db = setup_test_db().await;
        let owner = UserModel::create(&db, "O", "o@test.com", "password123", UserRole::Customer)
            .await
            .unwrap();
        let t = Model::create(
            &db,
            owner.id,
            "Subject",
            "Description",
            TicketCategory::General,
            TicketPriority::Low,
        )
        .await
        .unwrap();

        assert_eq!(
            Model::owner_and_assignee(&db, t.id).await,
            Some((owner.id, None))
        );
        assert_eq!(Model::owner_and_assignee(&db, 999).await, None);
    }
}
