use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::tickets::TicketStatus;

/// Append-only audit log of ticket transitions. Rows are never updated or
/// deleted; assignment actions land here as `assignment` pseudo-transitions
/// with old and new status equal.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub ticket_id: i64,
    /// Actor who caused the transition.
    pub user_id: i64,

    /// Absent only for the initial `New` entry.
    pub old_status: Option<String>,
    pub new_status: String,

    pub event: AuditEvent,
    pub changed_at: DateTime<Utc>,
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "audit_event")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AuditEvent {
    #[sea_orm(string_value = "status_change")]
    StatusChange,

    #[sea_orm(string_value = "assignment")]
    Assignment,
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
    Actor,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Appends one status transition row.
    pub async fn record_transition<C: ConnectionTrait>(
        db: &C,
        ticket_id: i64,
        actor_id: i64,
        old_status: Option<TicketStatus>,
        new_status: TicketStatus,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(actor_id),
            old_status: Set(old_status.map(|s| s.to_string())),
            new_status: Set(new_status.to_string()),
            event: Set(AuditEvent::StatusChange),
            changed_at: Set(Utc::now()),
            ..Default::default()
        };

        active.insert(db).await
    }

    /// Appends an assignment pseudo-transition (status unchanged).
    pub async fn record_assignment<C: ConnectionTrait>(
        db: &C,
        ticket_id: i64,
        actor_id: i64,
        current_status: TicketStatus,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(actor_id),
            old_status: Set(Some(current_status.to_string())),
            new_status: Set(current_status.to_string()),
            event: Set(AuditEvent::Assignment),
            changed_at: Set(Utc::now()),
            ..Default::default()
        };

        active.insert(db).await
    }

    pub async fn find_for_ticket<C: ConnectionTrait>(
        db: &C,
        ticket_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::TicketId.eq(ticket_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
