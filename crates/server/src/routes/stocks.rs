#![forbid(unsafe_code)]

use super::{ApiJson, ApiQuery, created, ok};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{movement_json, stock_json};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::scope::Location;
use vt_storage::{StockAdjustRequest, StockReceiveRequest, StockRow, StocksListRequest};

const MOVEMENTS_LIMIT: usize = 50;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/stocks", post(receive).get(list_stocks))
        .route("/stocks/{id}", get(get_stock))
        .route("/stocks/{id}/adjust", post(adjust))
}

async fn visible_stock(state: &AppState, session: &Session, id: String) -> Result<StockRow, ApiError> {
    let scope = session.staff_scope()?;
    let stock = state.run(move |store| store.stock_get(&id)).await?;
    if !scope.covers(&stock.location) {
        return Err(ApiError::UnknownId);
    }
    Ok(stock)
}

#[derive(Deserialize)]
struct ReceiveBody {
    vaccine_id: String,
    batch_number: String,
    quantity: i64,
    #[serde(default)]
    alert_threshold: Option<i64>,
    #[serde(default)]
    expires_at_ms: Option<i64>,
    #[serde(default)]
    health_center: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// Adds units of a batch at a health center; an agent can only receive into their own.
async fn receive(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<ReceiveBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let location = session.pin_location(Location {
        health_center: body.health_center,
        district: body.district,
        region: body.region,
    })?;
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.stock_receive(StockReceiveRequest {
                vaccine_id: body.vaccine_id,
                batch_number: body.batch_number,
                location,
                quantity: body.quantity,
                alert_threshold: body.alert_threshold,
                expires_at_ms: body.expires_at_ms,
                actor_id,
            })
        })
        .await?;
    tracing::info!(
        stock = %change.stock.id,
        delta = change.movement.delta,
        quantity = change.stock.quantity,
        "stock received"
    );
    Ok(created(json!({
        "stock": stock_json(&change.stock),
        "movement": movement_json(&change.movement),
    })))
}

#[derive(Deserialize)]
struct ListStocksQuery {
    vaccine_id: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_stocks(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListStocksQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let stocks = state
        .run(move |store| {
            store.stocks_list(StocksListRequest {
                scope,
                vaccine_id: query.vaccine_id,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({ "stocks": stocks.iter().map(stock_json).collect::<Vec<_>>() })))
}

async fn get_stock(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let stock = visible_stock(&state, &session, id).await?;
    let stock_id = stock.id.clone();
    let movements = state
        .run(move |store| store.stock_movements(&stock_id, MOVEMENTS_LIMIT))
        .await?;
    Ok(ok(json!({
        "stock": stock_json(&stock),
        "movements": movements.iter().map(movement_json).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
struct AdjustBody {
    delta: i64,
    reason: String,
    #[serde(default)]
    expected_revision: Option<i64>,
}

async fn adjust(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AdjustBody>,
) -> Result<Json<Value>, ApiError> {
    let current = visible_stock(&state, &session, id).await?;
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.stock_adjust(StockAdjustRequest {
                id: current.id,
                expected_revision: body.expected_revision,
                delta: body.delta,
                reason: body.reason,
                actor_id,
            })
        })
        .await?;
    tracing::info!(
        stock = %change.stock.id,
        delta = change.movement.delta,
        quantity = change.stock.quantity,
        "stock adjusted"
    );
    Ok(ok(json!({
        "stock": stock_json(&change.stock),
        "movement": movement_json(&change.movement),
    })))
}
