#![forbid(unsafe_code)]

use super::{ApiQuery, ok};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{breakdown_json, coverage_json, stock_alert_json};
use crate::state::AppState;
use crate::time::now_ms;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_storage::CoverageRequest;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/coverage", get(coverage))
        .route("/reports/breakdown", get(breakdown))
        .route("/reports/stock-alerts", get(stock_alerts))
}

#[derive(Deserialize)]
struct CoverageQuery {
    vaccine_id: Option<String>,
}

async fn coverage(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<CoverageQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let report = state
        .run(move |store| {
            store.coverage_report(CoverageRequest {
                scope,
                vaccine_id: query.vaccine_id,
            })
        })
        .await?;
    Ok(ok(coverage_json(&report)))
}

async fn breakdown(State(state): State<AppState>, session: Session) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let report = state.run(move |store| store.breakdown_report(&scope)).await?;
    Ok(ok(breakdown_json(&report)))
}

async fn stock_alerts(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let alerts = state
        .run(move |store| store.stock_alerts(&scope, now_ms()))
        .await?;
    Ok(ok(json!({ "alerts": alerts.iter().map(stock_alert_json).collect::<Vec<_>>() })))
}
