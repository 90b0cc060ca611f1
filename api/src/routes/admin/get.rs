use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use db::models::{tickets, user};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use util::state::AppState;

use super::internal;
use crate::response::ApiResponse;

/// GET /api/admin/users
pub async fn list_users(State(app_state): State<AppState>) -> Response {
    match user::Entity::find()
        .order_by_asc(user::Column::Username)
        .all(app_state.db())
        .await
    {
        Ok(users) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "users": users }),
                "Users retrieved",
            )),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/admin/moderators
///
/// The pool an admin can assign tickets to.
pub async fn list_moderators(State(app_state): State<AppState>) -> Response {
    match user::Model::find_moderators(app_state.db()).await {
        Ok(moderators) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "moderators": moderators }),
                "Moderators retrieved",
            )),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Serialize)]
pub struct ReportRow {
    pub ticket_id: i64,
    pub subject: String,
    pub status: tickets::TicketStatus,
    pub requester_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub days_spent: i64,
}

/// GET /api/admin/report?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD
///
/// Tickets closed within the date range, with how many days each one took.
pub async fn closure_report(
    State(app_state): State<AppState>,
    Query(range): Query<ReportQuery>,
) -> Response {
    if range.end_date < range.start_date {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(
                "end_date must not precede start_date",
            )),
        )
            .into_response();
    }

    let start = range
        .start_date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc());
    let end = range
        .end_date
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc());
    let (Some(start), Some(end)) = (start, end) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error("Invalid date range")),
        )
            .into_response();
    };

    let db = app_state.db();
    let closed = match tickets::Entity::find()
        .filter(tickets::Column::ClosedAt.is_not_null())
        .filter(tickets::Column::ClosedAt.gte(start))
        .filter(tickets::Column::ClosedAt.lte(end))
        .order_by_asc(tickets::Column::ClosedAt)
        .all(db)
        .await
    {
        Ok(closed) => closed,
        Err(e) => return internal(e),
    };

    let requester_ids: Vec<i64> = closed.iter().map(|t| t.user_id).collect();
    let requesters = match user::Entity::find()
        .filter(user::Column::Id.is_in(requester_ids))
        .all(db)
        .await
    {
        Ok(requesters) => requesters,
        Err(e) => return internal(e),
    };

    let rows: Vec<ReportRow> = closed
        .into_iter()
        .filter_map(|t| {
            let closed_at = t.closed_at?;
            Some(ReportRow {
                ticket_id: t.id,
                subject: t.subject,
                status: t.status,
                requester_username: requesters
                    .iter()
                    .find(|u| u.id == t.user_id)
                    .map(|u| u.username.clone()),
                created_at: t.created_at,
                closed_at,
                days_spent: (closed_at - t.created_at).num_days(),
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            json!({ "report": rows }),
            "Report generated",
        )),
    )
        .into_response()
}
