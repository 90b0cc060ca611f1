use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::DeriveActiveEnum;
use sea_orm::QueryFilter;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Requester who opened the case.
    pub user_id: i64,
    /// Staff member responsible for the ticket, once one exists.
    pub assigned_to: Option<i64>,

    pub subject: String,
    pub status: TicketStatus,

    pub created_at: DateTime<Utc>,
    /// Set exactly when status is Successful or Rejected.
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ticket_status")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TicketStatus {
    #[sea_orm(string_value = "new")]
    New,

    #[sea_orm(string_value = "in_progress")]
    InProgress,

    #[sea_orm(string_value = "on_hold")]
    OnHold,

    #[sea_orm(string_value = "successful")]
    Successful,

    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl TicketStatus {
    /// Statuses that close the ticket and stamp `closed_at`.
    pub fn is_closed(&self) -> bool {
        matches!(self, TicketStatus::Successful | TicketStatus::Rejected)
    }

    /// Statuses a staff reply automatically progresses out of.
    pub fn auto_progresses_on_staff_reply(&self) -> bool {
        matches!(
            self,
            TicketStatus::New | TicketStatus::Successful | TicketStatus::Rejected
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    Requester,

    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requester.def()
    }
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        subject: &str,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            user_id: Set(user_id),
            subject: Set(subject.to_owned()),
            status: Set(TicketStatus::New),
            created_at: Set(Utc::now()),
            closed_at: Set(None),
            ..Default::default()
        };

        active.insert(db).await
    }

    /// Tickets opened by one requester, newest first.
    pub async fn find_for_requester<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(db)
            .await
    }

    /// Staff view: every ticket, `New` ones first, oldest first within a group.
    pub async fn find_all_for_staff<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>, DbErr> {
        let mut tickets = Entity::find()
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await?;
        tickets.sort_by_key(|t| t.status != TicketStatus::New);
        Ok(tickets)
    }
}
