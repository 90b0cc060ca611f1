//! Ticket and message operations.
//!
//! Every mutation runs inside one database transaction; side effects (room
//! broadcasts, push notifications) are returned as [`Effect`] values and only
//! dispatched after the transaction commits, so a rollback never leaves
//! clients believing something happened.

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use chrono::{DateTime, Utc};
use db::models::{
    message_attachments::{self, NewAttachment},
    messages, status_history,
    tickets::{self, TicketStatus},
    user::{self, Role},
};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionTrait,
};
use thiserror::Error;
use util::dedup::DedupCache;

use crate::response::ApiResponse;
use crate::services::notify::PushPayload;
use crate::ws::payload::{MessagePayload, StatusUpdatePayload};

/// Who is performing the operation. Handlers build this from verified JWT
/// claims; the service layer never reaches into request state itself.
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext {
    pub actor_id: i64,
    pub actor_role: Role,
}

impl ServiceContext {
    pub fn new(actor_id: i64, actor_role: Role) -> Self {
        Self {
            actor_id,
            actor_role,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Authentication,

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error")]
    Db(#[from] DbErr),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Authentication => StatusCode::UNAUTHORIZED,
            ServiceError::Authorization(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match &self {
            ServiceError::Db(e) => {
                tracing::error!(error = %e, "Database error in ticket service");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (
            self.status_code(),
            Json(ApiResponse::<()>::error(message)),
        )
            .into_response()
    }
}

/// A side effect owed to the outside world after a successful commit.
#[derive(Debug, Clone)]
pub enum Effect {
    BroadcastMessage(MessagePayload),
    BroadcastStatus(StatusUpdatePayload),
    BroadcastTicketsReload,
    NotifyUser {
        user_id: i64,
        /// Used to suppress the push when the user is already watching the room.
        ticket_id: i64,
        payload: PushPayload,
    },
    NotifyStaff {
        payload: PushPayload,
    },
}

/// A saved upload, as handed over by the multipart layer. `original_name` is
/// what the client called the file and feeds the dedup fingerprint; `url` is
/// the collision-free name it was stored under.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl UploadedFile {
    fn as_attachment(&self) -> NewAttachment {
        NewAttachment {
            url: self.url.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

pub struct CreateTicket {
    pub subject: String,
    pub body: Option<String>,
    pub attachments: Vec<UploadedFile>,
}

pub struct CreateTicketOutcome {
    pub ticket: tickets::Model,
    pub message: Option<MessagePayload>,
    pub effects: Vec<Effect>,
}

pub struct PostMessage {
    pub ticket_id: i64,
    pub body: Option<String>,
    pub attachments: Vec<UploadedFile>,
    /// Client-chosen idempotency key; when absent a fingerprint is derived
    /// from actor, ticket, text and first attachment.
    pub dedup_key: Option<String>,
}

pub enum PostOutcome {
    Posted {
        message: MessagePayload,
        new_status: Option<TicketStatus>,
        effects: Vec<Effect>,
    },
    /// Same send seen within the dedup window; nothing was written.
    Duplicate,
}

pub struct StatusChangeOutcome {
    pub ticket: tickets::Model,
    pub time_spent: Option<String>,
    pub effects: Vec<Effect>,
}

/// What triggered an assignment decision.
#[derive(Debug, Clone, Copy)]
pub enum AutoAssignTrigger {
    StaffReply,
    StatusChange { old_status: TicketStatus },
}

/// Decides whether an unassigned ticket should be claimed by the acting staff
/// member. Never reassigns: an existing assignee always wins.
pub fn decide_auto_assign(
    ticket: &tickets::Model,
    actor_id: i64,
    actor_role: Role,
    trigger: AutoAssignTrigger,
) -> Option<i64> {
    if ticket.assigned_to.is_some() {
        return None;
    }
    match trigger {
        AutoAssignTrigger::StaffReply if actor_role.is_staff() => Some(actor_id),
        AutoAssignTrigger::StatusChange {
            old_status: TicketStatus::New,
        } if actor_role == Role::Moderator => Some(actor_id),
        _ => None,
    }
}

/// Which statuses a role may set directly. Admins may set anything;
/// moderators only the two working states. Requesters never change status.
pub fn role_may_set(role: Role, status: TicketStatus) -> bool {
    match role {
        Role::Admin => true,
        Role::Moderator => matches!(status, TicketStatus::InProgress | TicketStatus::OnHold),
        Role::User => false,
    }
}

/// Elapsed time between open and close, rendered as `"{d}d {h}h {m}m"`.
pub fn format_time_spent(opened: DateTime<Utc>, closed: DateTime<Utc>) -> String {
    let minutes = (closed - opened).num_minutes().max(0);
    let days = minutes / (24 * 60);
    let hours = (minutes % (24 * 60)) / 60;
    let mins = minutes % 60;
    format!("{days}d {hours}h {mins}m")
}

fn can_view(ticket: &tickets::Model, ctx: &ServiceContext) -> bool {
    ticket.user_id == ctx.actor_id || ctx.actor_role.is_staff()
}

async fn load_ticket<C: ConnectionTrait>(
    db: &C,
    ticket_id: i64,
) -> Result<tickets::Model, ServiceError> {
    tickets::Entity::find_by_id(ticket_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Ticket {ticket_id} not found")))
}

async fn load_actor<C: ConnectionTrait>(
    db: &C,
    ctx: &ServiceContext,
) -> Result<user::Model, ServiceError> {
    user::Entity::find_by_id(ctx.actor_id)
        .one(db)
        .await?
        .ok_or(ServiceError::Authentication)
}

/// Opens a new ticket, optionally with an initial message and attachments.
/// The ticket, its first message, its attachment rows and the initial audit
/// entry commit or roll back together.
pub async fn create_ticket(
    db: &DatabaseConnection,
    ctx: ServiceContext,
    input: CreateTicket,
) -> Result<CreateTicketOutcome, ServiceError> {
    let subject = input.subject.trim();
    if subject.is_empty() {
        return Err(ServiceError::Validation("Subject is required".into()));
    }

    let body = input.body.as_deref().unwrap_or("").trim().to_string();

    let txn = db.begin().await?;
    let actor = load_actor(&txn, &ctx).await?;

    let ticket = tickets::Model::create(&txn, ctx.actor_id, subject).await?;
    status_history::Model::record_transition(
        &txn,
        ticket.id,
        ctx.actor_id,
        None,
        TicketStatus::New,
    )
    .await?;

    let message = if !body.is_empty() || !input.attachments.is_empty() {
        let msg = messages::Model::create(&txn, ticket.id, ctx.actor_id, &body).await?;
        let new_attachments: Vec<NewAttachment> =
            input.attachments.iter().map(|f| f.as_attachment()).collect();
        let stored =
            message_attachments::Model::create_many(&txn, msg.id, &new_attachments).await?;
        Some(MessagePayload::from_parts(msg, &actor, stored))
    } else {
        None
    };

    txn.commit().await?;

    let effects = vec![
        Effect::BroadcastTicketsReload,
        Effect::NotifyStaff {
            payload: PushPayload {
                title: "New ticket".into(),
                body: format!("#{}: {}", ticket.id, ticket.subject),
                url: format!("/tickets/{}", ticket.id),
            },
        },
    ];

    Ok(CreateTicketOutcome {
        ticket,
        message,
        effects,
    })
}

/// Posts a chat message on a ticket.
///
/// A staff reply on a `New`, `Successful` or `Rejected` ticket automatically
/// moves it to `In Progress`, reopens it if it was closed, and claims it for
/// the replier when nobody holds it yet.
pub async fn post_message(
    db: &DatabaseConnection,
    dedup: &DedupCache,
    ctx: ServiceContext,
    input: PostMessage,
) -> Result<PostOutcome, ServiceError> {
    let body = input.body.as_deref().unwrap_or("").trim().to_string();
    if body.is_empty() && input.attachments.is_empty() {
        return Err(ServiceError::Validation(
            "A message needs text or at least one attachment".into(),
        ));
    }

    let fingerprint = match &input.dedup_key {
        Some(key) => format!("client:{}:{}:{}", ctx.actor_id, input.ticket_id, key),
        None => {
            let first = input
                .attachments
                .first()
                .map(|f| {
                    format!("{}:{}", f.original_name, f.size_bytes.unwrap_or_default())
                })
                .unwrap_or_default();
            format!("{}:{}:{}:{}", ctx.actor_id, input.ticket_id, body, first)
        }
    };
    if dedup.contains(&fingerprint) {
        return Ok(PostOutcome::Duplicate);
    }

    let txn = db.begin().await?;
    let actor = load_actor(&txn, &ctx).await?;
    let ticket = load_ticket(&txn, input.ticket_id).await?;

    if !can_view(&ticket, &ctx) {
        return Err(ServiceError::Authorization(
            "Not allowed to post on this ticket".into(),
        ));
    }

    let msg = messages::Model::create(&txn, ticket.id, ctx.actor_id, &body).await?;
    let new_attachments: Vec<NewAttachment> =
        input.attachments.iter().map(|f| f.as_attachment()).collect();
    let stored = message_attachments::Model::create_many(&txn, msg.id, &new_attachments).await?;

    let mut new_status = None;
    let mut ticket = ticket;
    if ctx.actor_role.is_staff() && ticket.status.auto_progresses_on_staff_reply() {
        let old = ticket.status;
        let assignee = decide_auto_assign(
            &ticket,
            ctx.actor_id,
            ctx.actor_role,
            AutoAssignTrigger::StaffReply,
        );

        let mut active: tickets::ActiveModel = ticket.into();
        active.status = Set(TicketStatus::InProgress);
        active.closed_at = Set(None);
        if let Some(staff_id) = assignee {
            active.assigned_to = Set(Some(staff_id));
        }
        ticket = active.update(&txn).await?;

        status_history::Model::record_transition(
            &txn,
            ticket.id,
            ctx.actor_id,
            Some(old),
            TicketStatus::InProgress,
        )
        .await?;
        new_status = Some(TicketStatus::InProgress);
    }

    txn.commit().await?;
    // Only a committed send may shadow its retries.
    dedup.record(&fingerprint);

    let payload = MessagePayload::from_parts(msg, &actor, stored);
    let mut effects = vec![Effect::BroadcastMessage(payload.clone())];

    if let Some(status) = new_status {
        effects.push(Effect::BroadcastStatus(StatusUpdatePayload {
            ticket_id: ticket.id,
            status,
            time_spent: None,
        }));
        effects.push(Effect::BroadcastTicketsReload);
    }

    let note = PushPayload {
        title: format!("Ticket #{}", ticket.id),
        body: if body.is_empty() {
            format!("{} sent an attachment", actor.username)
        } else {
            format!("{}: {}", actor.username, body)
        },
        url: format!("/tickets/{}", ticket.id),
    };
    if ctx.actor_id == ticket.user_id {
        // Requester wrote: ping the assignee, or all staff while unassigned.
        match ticket.assigned_to {
            Some(staff_id) => effects.push(Effect::NotifyUser {
                user_id: staff_id,
                ticket_id: ticket.id,
                payload: note,
            }),
            None => effects.push(Effect::NotifyStaff { payload: note }),
        }
    } else {
        effects.push(Effect::NotifyUser {
            user_id: ticket.user_id,
            ticket_id: ticket.id,
            payload: note,
        });
    }

    Ok(PostOutcome::Posted {
        message: payload,
        new_status,
        effects,
    })
}

/// Directly sets a ticket's status, subject to the role gate.
pub async fn change_status(
    db: &DatabaseConnection,
    ctx: ServiceContext,
    ticket_id: i64,
    new_status: TicketStatus,
) -> Result<StatusChangeOutcome, ServiceError> {
    if !ctx.actor_role.is_staff() {
        return Err(ServiceError::Authorization("Staff access required".into()));
    }
    if !role_may_set(ctx.actor_role, new_status) {
        return Err(ServiceError::Authorization(format!(
            "Moderators may not set status '{new_status}'"
        )));
    }

    let txn = db.begin().await?;
    let ticket = load_ticket(&txn, ticket_id).await?;
    let old = ticket.status;

    let now = Utc::now();
    let (closed_at, time_spent) = if new_status.is_closed() {
        (Some(now), Some(format_time_spent(ticket.created_at, now)))
    } else {
        (None, None)
    };

    let assignee = decide_auto_assign(
        &ticket,
        ctx.actor_id,
        ctx.actor_role,
        AutoAssignTrigger::StatusChange { old_status: old },
    );

    let mut active: tickets::ActiveModel = ticket.into();
    active.status = Set(new_status);
    active.closed_at = Set(closed_at);
    if let Some(staff_id) = assignee {
        active.assigned_to = Set(Some(staff_id));
    }
    let ticket = active.update(&txn).await?;

    status_history::Model::record_transition(&txn, ticket.id, ctx.actor_id, Some(old), new_status)
        .await?;

    txn.commit().await?;

    let effects = vec![
        Effect::BroadcastStatus(StatusUpdatePayload {
            ticket_id: ticket.id,
            status: new_status,
            time_spent: time_spent.clone(),
        }),
        Effect::BroadcastTicketsReload,
        Effect::NotifyUser {
            user_id: ticket.user_id,
            ticket_id: ticket.id,
            payload: PushPayload {
                title: format!("Ticket #{}", ticket.id),
                body: format!("Status changed to {new_status}"),
                url: format!("/tickets/{}", ticket.id),
            },
        },
    ];

    Ok(StatusChangeOutcome {
        ticket,
        time_spent,
        effects,
    })
}

/// Admin action: hands a ticket to a moderator. Recorded in the audit log as
/// an assignment entry with the status left untouched.
pub async fn assign_ticket(
    db: &DatabaseConnection,
    ctx: ServiceContext,
    ticket_id: i64,
    staff_id: i64,
) -> Result<(tickets::Model, Vec<Effect>), ServiceError> {
    if ctx.actor_role != Role::Admin {
        return Err(ServiceError::Authorization("Admin access required".into()));
    }

    let txn = db.begin().await?;
    let ticket = load_ticket(&txn, ticket_id).await?;

    let staff = user::Entity::find_by_id(staff_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {staff_id} not found")))?;
    if staff.role != Role::Moderator {
        return Err(ServiceError::Validation(
            "Assignee must hold the moderator role".into(),
        ));
    }

    let current_status = ticket.status;
    let mut active: tickets::ActiveModel = ticket.into();
    active.assigned_to = Set(Some(staff_id));
    let ticket = active.update(&txn).await?;

    status_history::Model::record_assignment(&txn, ticket.id, ctx.actor_id, current_status)
        .await?;

    txn.commit().await?;

    Ok((ticket, vec![Effect::BroadcastTicketsReload]))
}

/// Read access check shared by the message list endpoint and the ws join.
pub async fn authorize_ticket_access(
    db: &DatabaseConnection,
    ctx: ServiceContext,
    ticket_id: i64,
) -> Result<tickets::Model, ServiceError> {
    let ticket = load_ticket(db, ticket_id).await?;
    if !can_view(&ticket, &ctx) {
        return Err(ServiceError::Authorization(
            "Not allowed to access this ticket".into(),
        ));
    }
    Ok(ticket)
}

/// Full chronological transcript of a ticket with nested attachments.
pub async fn list_messages(
    db: &DatabaseConnection,
    ctx: ServiceContext,
    ticket_id: i64,
) -> Result<Vec<MessagePayload>, ServiceError> {
    authorize_ticket_access(db, ctx, ticket_id).await?;

    let msgs = messages::Model::find_all_for_ticket(db, ticket_id).await?;
    let ids: Vec<i64> = msgs.iter().map(|m| m.id).collect();
    let attachments = message_attachments::Model::find_for_messages(db, &ids).await?;

    let sender_ids: Vec<i64> = msgs.iter().map(|m| m.sender_id).collect();
    let senders = user::Entity::find()
        .filter(user::Column::Id.is_in(sender_ids))
        .all(db)
        .await?;

    let mut out = Vec::with_capacity(msgs.len());
    for msg in msgs {
        let sender = senders.iter().find(|u| u.id == msg.sender_id);
        let Some(sender) = sender else { continue };
        let mine: Vec<_> = attachments
            .iter()
            .filter(|a| a.message_id == msg.id)
            .cloned()
            .collect();
        out.push(MessagePayload::from_parts(msg, sender, mine));
    }
    Ok(out)
}
