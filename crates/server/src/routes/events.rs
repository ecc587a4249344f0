#![forbid(unsafe_code)]

use crate::auth::Session;
use crate::realtime::event_stream;
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{KeepAlive, Sse};
use axum::routing::get;
use axum::Router;

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/events", get(events))
}

/// Live channel. Clients that fall behind or reconnect catch up through `/notifications`.
async fn events(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let rooms = session.rooms();
    tracing::debug!(subject = session.subject(), rooms = rooms.len(), "event stream opened");
    Sse::new(event_stream(state.hub.subscribe(), rooms)).keep_alive(KeepAlive::default())
}
