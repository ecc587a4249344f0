#![forbid(unsafe_code)]

use super::children::visible_child;
use super::{ApiJson, ApiQuery, created, ok, parse_opt};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{vaccination_change_json, vaccination_json};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::VaccinationStatus;
use vt_storage::{
    ChildRow, VaccinationChange, VaccinationCloseRequest, VaccinationCompleteRequest, VaccinationRow,
    VaccinationRescheduleRequest, VaccinationScheduleRequest, VaccinationsListRequest,
};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/vaccinations", post(schedule).get(list_vaccinations))
        .route("/vaccinations/{id}", get(get_vaccination))
        .route("/vaccinations/{id}/complete", post(complete))
        .route("/vaccinations/{id}/missed", post(mark_missed))
        .route("/vaccinations/{id}/cancel", post(cancel))
        .route("/vaccinations/{id}/reschedule", post(reschedule))
}

async fn visible_vaccination(
    state: &AppState,
    session: &Session,
    id: String,
) -> Result<VaccinationRow, ApiError> {
    Ok(visible_vaccination_with_child(state, session, id).await?.0)
}

async fn visible_vaccination_with_child(
    state: &AppState,
    session: &Session,
    id: String,
) -> Result<(VaccinationRow, ChildRow), ApiError> {
    session.require_staff()?;
    let vaccination = state.run(move |store| store.vaccination_get(&id)).await?;
    let child = visible_child(state, session, vaccination.child_id.clone()).await?;
    Ok((vaccination, child))
}

/// Stock is drawn where the dose was given: the caller's own center or the child's.
fn administering_center(
    session: &Session,
    child: &ChildRow,
    requested: Option<String>,
) -> Result<Option<String>, ApiError> {
    let own = session.actor.location.health_center.clone();
    let Some(requested) = requested.filter(|center| !center.trim().is_empty()) else {
        return Ok(own);
    };
    let center = requested.trim();
    if own.as_deref() == Some(center) || child.location.health_center.as_deref() == Some(center) {
        Ok(Some(center.to_string()))
    } else {
        Err(ApiError::Forbidden("health center is outside your scope"))
    }
}

fn log_change(change: &VaccinationChange, actor: &str) {
    tracing::info!(
        vaccination = %change.vaccination.id,
        status = change.vaccination.status.as_str(),
        child_status = change.child_status.as_str(),
        by = actor,
        "vaccination updated"
    );
}

#[derive(Deserialize)]
struct ScheduleBody {
    child_id: String,
    vaccine_id: String,
    #[serde(default = "first_dose")]
    dose: i64,
    scheduled_at_ms: i64,
    #[serde(default)]
    planned: bool,
    #[serde(default)]
    notes: Option<String>,
}

fn first_dose() -> i64 {
    1
}

async fn schedule(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<ScheduleBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    session.require_staff()?;
    let child = visible_child(&state, &session, body.child_id).await?;
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.vaccination_schedule(VaccinationScheduleRequest {
                child_id: child.id,
                vaccine_id: body.vaccine_id,
                dose: body.dose,
                scheduled_at_ms: body.scheduled_at_ms,
                planned: body.planned,
                notes: body.notes,
                actor_id,
            })
        })
        .await?;
    log_change(&change, session.subject());
    Ok(created(vaccination_change_json(&change)))
}

#[derive(Deserialize)]
struct ListVaccinationsQuery {
    child_id: Option<String>,
    vaccine_id: Option<String>,
    status: Option<String>,
    from_ms: Option<i64>,
    to_ms: Option<i64>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_vaccinations(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListVaccinationsQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let status = parse_opt(
        query.status.as_deref(),
        VaccinationStatus::parse,
        "status is invalid",
    )?;
    let result = state
        .run(move |store| {
            store.vaccinations_list(VaccinationsListRequest {
                scope,
                child_id: query.child_id,
                vaccine_id: query.vaccine_id,
                status,
                from_ms: query.from_ms,
                to_ms: query.to_ms,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({
        "vaccinations": result.vaccinations.iter().map(vaccination_json).collect::<Vec<_>>(),
        "has_more": result.has_more,
    })))
}

async fn get_vaccination(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let vaccination = visible_vaccination(&state, &session, id).await?;
    Ok(ok(vaccination_json(&vaccination)))
}

#[derive(Deserialize)]
struct CompleteBody {
    #[serde(default)]
    expected_revision: Option<i64>,
    #[serde(default)]
    done_at_ms: Option<i64>,
    #[serde(default)]
    batch_number: Option<String>,
    #[serde(default)]
    health_center: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn complete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CompleteBody>,
) -> Result<Json<Value>, ApiError> {
    let (current, child) = visible_vaccination_with_child(&state, &session, id).await?;
    let health_center = administering_center(&session, &child, body.health_center)?;
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.vaccination_complete(VaccinationCompleteRequest {
                id: current.id,
                expected_revision: body.expected_revision,
                done_at_ms: body.done_at_ms,
                batch_number: body.batch_number,
                health_center,
                notes: body.notes,
                actor_id,
            })
        })
        .await?;
    if change.stock_movement.is_none() {
        tracing::warn!(
            vaccination = %change.vaccination.id,
            vaccine = %change.vaccination.vaccine_id,
            "completed without matching stock; nothing decremented"
        );
    }
    log_change(&change, session.subject());
    Ok(ok(vaccination_change_json(&change)))
}

#[derive(Deserialize)]
struct CloseBody {
    #[serde(default)]
    expected_revision: Option<i64>,
    #[serde(default)]
    notes: Option<String>,
}

async fn mark_missed(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CloseBody>,
) -> Result<Json<Value>, ApiError> {
    let current = visible_vaccination(&state, &session, id).await?;
    let request = VaccinationCloseRequest {
        id: current.id,
        expected_revision: body.expected_revision,
        notes: body.notes,
        actor_id: Some(session.subject().to_string()),
    };
    let change = state
        .run(move |store| store.vaccination_mark_missed(request))
        .await?;
    log_change(&change, session.subject());
    Ok(ok(vaccination_change_json(&change)))
}

async fn cancel(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CloseBody>,
) -> Result<Json<Value>, ApiError> {
    let current = visible_vaccination(&state, &session, id).await?;
    let request = VaccinationCloseRequest {
        id: current.id,
        expected_revision: body.expected_revision,
        notes: body.notes,
        actor_id: Some(session.subject().to_string()),
    };
    let change = state.run(move |store| store.vaccination_cancel(request)).await?;
    log_change(&change, session.subject());
    Ok(ok(vaccination_change_json(&change)))
}

#[derive(Deserialize)]
struct RescheduleBody {
    #[serde(default)]
    expected_revision: Option<i64>,
    scheduled_at_ms: i64,
    #[serde(default)]
    notes: Option<String>,
}

async fn reschedule(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RescheduleBody>,
) -> Result<Json<Value>, ApiError> {
    let current = visible_vaccination(&state, &session, id).await?;
    let request = VaccinationRescheduleRequest {
        id: current.id,
        expected_revision: body.expected_revision,
        scheduled_at_ms: body.scheduled_at_ms,
        notes: body.notes,
        actor_id: Some(session.subject().to_string()),
    };
    let change = state
        .run(move |store| store.vaccination_reschedule(request))
        .await?;
    log_change(&change, session.subject());
    Ok(ok(vaccination_change_json(&change)))
}
