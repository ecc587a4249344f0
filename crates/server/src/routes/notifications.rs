#![forbid(unsafe_code)]

use super::{ApiQuery, ok};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::notification_view_json;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_storage::NotificationsListRequest;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{seq}/read", post(mark_read))
}

#[derive(Deserialize)]
struct ListNotificationsQuery {
    after_seq: Option<i64>,
    #[serde(default)]
    unread_only: bool,
    limit: Option<usize>,
}

/// The persisted channel: everything addressed to the caller's rooms, oldest first, with a
/// cursor for the next page.
async fn list_notifications(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListNotificationsQuery>,
) -> Result<Json<Value>, ApiError> {
    let rooms = session.rooms();
    let reader = session.reader();
    let page = state
        .run(move |store| {
            store.notifications_list(NotificationsListRequest {
                rooms,
                reader,
                after_seq: query.after_seq.unwrap_or(0).max(0),
                unread_only: query.unread_only,
                limit: query.limit.unwrap_or(0),
            })
        })
        .await?;
    let items = page
        .items
        .iter()
        .map(notification_view_json)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ApiError::internal(format!("notification meta is not JSON: {err}")))?;
    Ok(ok(json!({
        "notifications": items,
        "next_after_seq": page.next_after_seq,
        "has_more": page.has_more,
    })))
}

async fn mark_read(
    State(state): State<AppState>,
    session: Session,
    Path(seq): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let seq = seq
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::invalid("notification seq must be an integer"))?;
    let rooms = session.rooms();
    let reader = session.reader();
    state
        .run(move |store| store.notification_mark_read(seq, &reader, &rooms))
        .await?;
    Ok(ok(json!({ "seq": seq, "read": true })))
}
