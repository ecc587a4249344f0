#![forbid(unsafe_code)]

use super::children::visible_child;
use super::{ApiJson, ApiQuery, created, ok, parse_opt, parse_required};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{appointment_json, appointment_request_json};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::{AppointmentStatus, RequestStatus};
use vt_storage::{
    AppointmentCreateRequest, AppointmentRequestAnswerRequest, AppointmentRequestsListRequest,
    AppointmentSetStatusRequest, AppointmentsListRequest,
};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment).get(list_appointments))
        .route("/appointments/{id}/status", post(set_status))
        .route("/appointment-requests", get(list_requests))
        .route("/appointment-requests/{id}/answer", post(answer_request))
}

#[derive(Deserialize)]
struct CreateAppointmentBody {
    child_id: String,
    #[serde(default)]
    vaccine_id: Option<String>,
    scheduled_at_ms: i64,
    #[serde(default)]
    notes: Option<String>,
}

async fn create_appointment(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CreateAppointmentBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    session.require_staff()?;
    let child = visible_child(&state, &session, body.child_id).await?;
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.appointment_create(AppointmentCreateRequest {
                child_id: child.id,
                vaccine_id: body.vaccine_id,
                scheduled_at_ms: body.scheduled_at_ms,
                notes: body.notes,
                actor_id,
            })
        })
        .await?;
    Ok(created(json!({
        "appointment": appointment_json(&change.appointment),
        "child_status": change.child_status.as_str(),
    })))
}

#[derive(Deserialize)]
struct ListAppointmentsQuery {
    child_id: Option<String>,
    status: Option<String>,
    from_ms: Option<i64>,
    to_ms: Option<i64>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_appointments(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListAppointmentsQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let status = parse_opt(
        query.status.as_deref(),
        AppointmentStatus::parse,
        "status is invalid",
    )?;
    let appointments = state
        .run(move |store| {
            store.appointments_list(AppointmentsListRequest {
                scope,
                child_id: query.child_id,
                status,
                from_ms: query.from_ms,
                to_ms: query.to_ms,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({
        "appointments": appointments.iter().map(appointment_json).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
struct SetStatusBody {
    status: String,
    #[serde(default)]
    expected_revision: Option<i64>,
}

async fn set_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SetStatusBody>,
) -> Result<Json<Value>, ApiError> {
    session.require_staff()?;
    let status = parse_required(&body.status, AppointmentStatus::parse, "status is invalid")?;
    let lookup = id.clone();
    let current = state.run(move |store| store.appointment_get(&lookup)).await?;
    visible_child(&state, &session, current.child_id).await?;
    let change = state
        .run(move |store| {
            store.appointment_set_status(AppointmentSetStatusRequest {
                id,
                expected_revision: body.expected_revision,
                status,
            })
        })
        .await?;
    Ok(ok(json!({
        "appointment": appointment_json(&change.appointment),
        "child_status": change.child_status.as_str(),
    })))
}

#[derive(Deserialize)]
struct ListRequestsQuery {
    status: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_requests(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListRequestsQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let status = parse_opt(query.status.as_deref(), RequestStatus::parse, "status is invalid")?;
    let requests = state
        .run(move |store| {
            store.appointment_requests_list(AppointmentRequestsListRequest {
                scope,
                status,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({
        "requests": requests.iter().map(appointment_request_json).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
struct AnswerBody {
    accept: bool,
    #[serde(default)]
    expected_revision: Option<i64>,
    #[serde(default)]
    scheduled_at_ms: Option<i64>,
    #[serde(default)]
    note: Option<String>,
}

async fn answer_request(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AnswerBody>,
) -> Result<Json<Value>, ApiError> {
    session.require_staff()?;
    let lookup = id.clone();
    let current = state
        .run(move |store| store.appointment_request_get(&lookup))
        .await?;
    visible_child(&state, &session, current.child_id).await?;
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.appointment_request_answer(AppointmentRequestAnswerRequest {
                id,
                expected_revision: body.expected_revision,
                accept: body.accept,
                scheduled_at_ms: body.scheduled_at_ms,
                note: body.note,
                actor_id,
            })
        })
        .await?;
    tracing::info!(
        request = %change.request.id,
        status = change.request.status.as_str(),
        by = session.subject(),
        "appointment request answered"
    );
    Ok(ok(json!({
        "request": appointment_request_json(&change.request),
        "appointment": change.appointment.as_ref().map(appointment_json),
    })))
}
