use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{tickets, user};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use serde_json::json;
use util::state::AppState;

use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use crate::services::tickets::{self as ticket_service, ServiceContext};

/// Ticket row decorated with the names list views actually render.
#[derive(Serialize)]
pub struct TicketListEntry {
    #[serde(flatten)]
    pub ticket: tickets::Model,
    pub requester_username: Option<String>,
    pub assignee_username: Option<String>,
}

async fn usernames_for(
    db: &DatabaseConnection,
    tickets: &[tickets::Model],
) -> Result<HashMap<i64, String>, DbErr> {
    let mut ids: Vec<i64> = tickets.iter().map(|t| t.user_id).collect();
    ids.extend(tickets.iter().filter_map(|t| t.assigned_to));
    ids.sort_unstable();
    ids.dedup();

    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
}

fn decorate(tickets: Vec<tickets::Model>, names: &HashMap<i64, String>) -> Vec<TicketListEntry> {
    tickets
        .into_iter()
        .map(|t| TicketListEntry {
            requester_username: names.get(&t.user_id).cloned(),
            assignee_username: t.assigned_to.and_then(|id| names.get(&id).cloned()),
            ticket: t,
        })
        .collect()
}

fn db_failure(e: DbErr) -> Response {
    tracing::error!(error = %e, "Database error while listing tickets");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("Internal server error")),
    )
        .into_response()
}

/// GET /api/tickets/my
///
/// The requester's own tickets, newest first.
pub async fn list_my_tickets(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    let db = app_state.db();
    let found = match tickets::Model::find_for_requester(db, claims.sub).await {
        Ok(found) => found,
        Err(e) => return db_failure(e),
    };
    let names = match usernames_for(db, &found).await {
        Ok(names) => names,
        Err(e) => return db_failure(e),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            json!({ "tickets": decorate(found, &names) }),
            "Tickets retrieved",
        )),
    )
        .into_response()
}

/// GET /api/tickets/all
///
/// Staff view of every ticket: `New` ones first, oldest first within a group.
pub async fn list_all_tickets(State(app_state): State<AppState>) -> Response {
    let db = app_state.db();
    let found = match tickets::Model::find_all_for_staff(db).await {
        Ok(found) => found,
        Err(e) => return db_failure(e),
    };
    let names = match usernames_for(db, &found).await {
        Ok(names) => names,
        Err(e) => return db_failure(e),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            json!({ "tickets": decorate(found, &names) }),
            "Tickets retrieved",
        )),
    )
        .into_response()
}

/// GET /api/tickets/{ticket_id}/messages
///
/// Full chronological transcript with nested attachments. Requester or staff
/// only.
pub async fn list_messages(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Path(ticket_id): Path<i64>,
) -> Response {
    let ctx = ServiceContext::new(claims.sub, claims.role);
    match ticket_service::list_messages(app_state.db(), ctx, ticket_id).await {
        Ok(messages) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "messages": messages }),
                "Messages retrieved",
            )),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
