use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use util::state::AppState;

use super::common::{discard_uploads, read_multipart};
use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use crate::services::dispatcher::dispatch_effects;
use crate::services::notify::notifier;
use crate::services::tickets::{
    self, CreateTicket, PostMessage, PostOutcome, ServiceContext,
};

/// POST /api/tickets
///
/// Opens a ticket from a multipart form: `subject` (required), optional
/// `body`, and any number of file parts that become attachments on the
/// initial message.
pub async fn create_ticket(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    multipart: Multipart,
) -> Response {
    let parsed = match read_multipart(multipart).await {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    let ctx = ServiceContext::new(claims.sub, claims.role);
    let input = CreateTicket {
        subject: parsed.subject.unwrap_or_default(),
        body: parsed.body,
        attachments: parsed.files.clone(),
    };

    match tickets::create_ticket(app_state.db(), ctx, input).await {
        Ok(outcome) => {
            dispatch_effects(&app_state, notifier().as_ref(), outcome.effects).await;
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(
                    json!({
                        "ticket": outcome.ticket,
                        "message": outcome.message,
                    }),
                    "Ticket created",
                )),
            )
                .into_response()
        }
        Err(e) => {
            discard_uploads(&parsed.files).await;
            e.into_response()
        }
    }
}

/// POST /api/tickets/{ticket_id}/messages
///
/// Appends a chat message (text and/or attachments) to a ticket. A repeat of
/// the same send within the dedup window is acknowledged without writing
/// anything.
pub async fn post_message(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Path(ticket_id): Path<i64>,
    multipart: Multipart,
) -> Response {
    let parsed = match read_multipart(multipart).await {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    let ctx = ServiceContext::new(claims.sub, claims.role);
    let input = PostMessage {
        ticket_id,
        body: parsed.body.clone(),
        attachments: parsed.files.clone(),
        dedup_key: parsed.dedup_key.clone(),
    };

    match tickets::post_message(app_state.db(), app_state.dedup(), ctx, input).await {
        Ok(PostOutcome::Posted {
            message,
            new_status,
            effects,
        }) => {
            dispatch_effects(&app_state, notifier().as_ref(), effects).await;
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(
                    json!({
                        "message": message,
                        "new_status": new_status,
                        "duplicate": false,
                    }),
                    "Message sent",
                )),
            )
                .into_response()
        }
        Ok(PostOutcome::Duplicate) => {
            // The first send already stored these bytes; ours are orphans.
            discard_uploads(&parsed.files).await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    json!({ "duplicate": true }),
                    "Duplicate send ignored",
                )),
            )
                .into_response()
        }
        Err(e) => {
            discard_uploads(&parsed.files).await;
            e.into_response()
        }
    }
}
