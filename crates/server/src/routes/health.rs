#![forbid(unsafe_code)]

use super::ok;
use crate::state::AppState;
use crate::time::{now_ms, ts_ms_to_rfc3339};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "now": ts_ms_to_rfc3339(now_ms()),
        "realtime_subscribers": state.hub.subscribers(),
    }))
}
