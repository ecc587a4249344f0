#![forbid(unsafe_code)]

use super::{ApiJson, ApiQuery, created, ok};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::vaccine_json;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::Role;
use vt_storage::{VaccineCreateRequest, VaccineUpdateRequest};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/vaccines", get(list_vaccines).post(create_vaccine))
        .route("/vaccines/{id}", patch(update_vaccine).get(get_vaccine))
}

#[derive(Deserialize)]
struct ListVaccinesQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_vaccines(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(query): ApiQuery<ListVaccinesQuery>,
) -> Result<Json<Value>, ApiError> {
    let vaccines = state
        .run(move |store| store.vaccines_list(query.include_inactive))
        .await?;
    Ok(ok(json!({ "vaccines": vaccines.iter().map(vaccine_json).collect::<Vec<_>>() })))
}

async fn get_vaccine(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let vaccine = state.run(move |store| store.vaccine_get(&id)).await?;
    Ok(ok(vaccine_json(&vaccine)))
}

#[derive(Deserialize)]
struct CreateVaccineBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    min_age_days: i64,
    #[serde(default = "one_dose")]
    doses_required: i64,
    #[serde(default)]
    dose_interval_days: i64,
}

fn one_dose() -> i64 {
    1
}

async fn create_vaccine(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CreateVaccineBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    session.require_at_least(Role::National)?;
    let vaccine = state
        .run(move |store| {
            store.vaccine_create(VaccineCreateRequest {
                name: body.name,
                description: body.description,
                min_age_days: body.min_age_days,
                doses_required: body.doses_required,
                dose_interval_days: body.dose_interval_days,
            })
        })
        .await?;
    tracing::info!(vaccine = %vaccine.id, name = %vaccine.name, "vaccine added to catalog");
    Ok(created(vaccine_json(&vaccine)))
}

#[derive(Deserialize)]
struct UpdateVaccineBody {
    #[serde(default)]
    expected_revision: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    min_age_days: Option<i64>,
    #[serde(default)]
    doses_required: Option<i64>,
    #[serde(default)]
    dose_interval_days: Option<i64>,
    #[serde(default)]
    active: Option<bool>,
}

/// Calendar edits reach stored child statuses on the next sweep.
async fn update_vaccine(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateVaccineBody>,
) -> Result<Json<Value>, ApiError> {
    session.require_at_least(Role::National)?;
    let vaccine = state
        .run(move |store| {
            store.vaccine_update(VaccineUpdateRequest {
                id,
                expected_revision: body.expected_revision,
                name: body.name,
                description: body.description,
                min_age_days: body.min_age_days,
                doses_required: body.doses_required,
                dose_interval_days: body.dose_interval_days,
                active: body.active,
            })
        })
        .await?;
    Ok(ok(vaccine_json(&vaccine)))
}
