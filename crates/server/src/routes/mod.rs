#![forbid(unsafe_code)]

mod appointments;
mod auth;
mod campaigns;
mod children;
mod events;
mod health;
mod mobile;
mod notifications;
mod reports;
mod stocks;
mod users;
mod vaccinations;
mod vaccines;

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{Value, json};

/// JSON body whose rejection uses the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection uses the API error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .merge(children::routes())
        .merge(vaccines::routes())
        .merge(vaccinations::routes())
        .merge(appointments::routes())
        .merge(stocks::routes())
        .merge(reports::routes())
        .merge(campaigns::routes())
        .merge(notifications::routes())
        .merge(events::routes())
        .merge(mobile::routes())
}

pub(crate) fn ok(result: Value) -> Json<Value> {
    Json(json!({ "success": true, "result": result }))
}

pub(crate) fn created(result: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, ok(result))
}

/// Parses an optional enum-like query value; unknown values are rejected, not ignored.
pub(crate) fn parse_opt<T>(
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    message: &'static str,
) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse(value).map(Some).ok_or_else(|| ApiError::invalid(message)),
        None => Ok(None),
    }
}

pub(crate) fn parse_required<T>(
    raw: &str,
    parse: fn(&str) -> Option<T>,
    message: &'static str,
) -> Result<T, ApiError> {
    parse(raw.trim()).ok_or_else(|| ApiError::invalid(message))
}
