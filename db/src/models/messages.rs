use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub ticket_id: i64,
    pub sender_id: i64,

    /// May be empty only when the message carries attachments.
    pub body: String,

    pub created_at: DateTime<Utc>,
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
        from = "Column::SenderId",
        to = "super::user::Column::Id"
    )]
    Sender,

    #[sea_orm(has_many = "super::message_attachments::Entity")]
    Attachments,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sender.def()
    }
}

impl Related<super::message_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        ticket_id: i64,
        sender_id: i64,
        body: &str,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            ticket_id: Set(ticket_id),
            sender_id: Set(sender_id),
            body: Set(body.to_owned()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active.insert(db).await
    }

    /// All messages of a ticket in chronological order.
    pub async fn find_all_for_ticket<C: ConnectionTrait>(
        db: &C,
        ticket_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::TicketId.eq(ticket_id))
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await
    }
}
