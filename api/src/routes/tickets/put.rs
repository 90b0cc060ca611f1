use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::tickets::TicketStatus;
use serde::Deserialize;
use serde_json::json;
use util::state::AppState;

use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use crate::services::dispatcher::dispatch_effects;
use crate::services::notify::notifier;
use crate::services::tickets::{self, ServiceContext};

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TicketStatus,
}

/// PUT /api/tickets/{ticket_id}/status
///
/// Sets the ticket status. Admins may set any status; moderators only
/// `in_progress` and `on_hold` (anything else is a 403, not a silent clamp).
pub async fn change_status(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Path(ticket_id): Path<i64>,
    Json(req): Json<ChangeStatusRequest>,
) -> Response {
    let ctx = ServiceContext::new(claims.sub, claims.role);
    match tickets::change_status(app_state.db(), ctx, ticket_id, req.status).await {
        Ok(outcome) => {
            dispatch_effects(&app_state, notifier().as_ref(), outcome.effects).await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    json!({
                        "ticket": outcome.ticket,
                        "time_spent": outcome.time_spent,
                    }),
                    "Status updated",
                )),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub staff_id: i64,
}

/// PUT /api/tickets/{ticket_id}/assign
///
/// Admin action: hands the ticket to a staff member.
pub async fn assign_ticket(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Path(ticket_id): Path<i64>,
    Json(req): Json<AssignRequest>,
) -> Response {
    let ctx = ServiceContext::new(claims.sub, claims.role);
    match tickets::assign_ticket(app_state.db(), ctx, ticket_id, req.staff_id).await {
        Ok((ticket, effects)) => {
            dispatch_effects(&app_state, notifier().as_ref(), effects).await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    json!({ "ticket": ticket }),
                    "Ticket assigned",
                )),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
