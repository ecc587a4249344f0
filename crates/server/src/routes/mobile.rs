#![forbid(unsafe_code)]

//! Guardian-facing endpoints. Guardians sign in with their phone number and a PIN set by
//! staff, and only ever see children registered under that phone.

use super::{ApiJson, ApiQuery, created, ok, parse_opt};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{
    appointment_request_json, campaign_json, child_detail_json, child_json, guardian_lookup_json,
};
use crate::state::AppState;
use crate::time::now_ms;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::RequestStatus;
use vt_core::scope::Scope;
use vt_storage::{
    AppointmentRequestCreateRequest, AppointmentRequestsListRequest, CampaignsListRequest,
    SessionCreateRequest, SessionSubject,
};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/mobile/lookup", post(lookup))
        .route("/mobile/login", post(login))
        .route("/mobile/children", get(list_children))
        .route("/mobile/children/{id}", get(get_child))
        .route(
            "/mobile/appointment-requests",
            post(create_request).get(list_requests),
        )
        .route("/mobile/campaigns", get(list_campaigns))
}

#[derive(Deserialize)]
struct LookupBody {
    phone: String,
}

/// Tells the app whether a phone has children on record and whether a PIN exists yet.
async fn lookup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LookupBody>,
) -> Result<Json<Value>, ApiError> {
    let found = state
        .run(move |store| store.guardian_lookup(&body.phone))
        .await?;
    Ok(ok(guardian_lookup_json(&found)))
}

#[derive(Deserialize)]
struct LoginBody {
    phone: String,
    pin: String,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<Value>, ApiError> {
    let ttl_ms = state.config.guardian_session_ttl_ms();
    let (phone, session) = state
        .run(move |store| {
            let phone = store.guardian_authenticate(&body.phone, &body.pin, now_ms())?;
            let session = store.session_create(SessionCreateRequest {
                subject: SessionSubject::Guardian(phone.clone()),
                ttl_ms,
            })?;
            Ok((phone, session))
        })
        .await?;
    tracing::info!("guardian login");
    Ok(ok(json!({
        "token": session.token,
        "expires_at_ms": session.expires_at_ms,
        "phone": phone,
    })))
}

async fn list_children(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let phone = session.require_guardian()?.to_string();
    let children = state
        .run(move |store| store.children_for_guardian(&phone))
        .await?;
    Ok(ok(json!({ "children": children.iter().map(child_json).collect::<Vec<_>>() })))
}

async fn get_child(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    session.require_guardian()?;
    let detail = state
        .run(move |store| store.child_detail(&id, now_ms()))
        .await?;
    session.ensure_visible(&detail.child.location, Some(&detail.child.guardian_phone))?;
    Ok(ok(child_detail_json(&detail)))
}

#[derive(Deserialize)]
struct CreateRequestBody {
    child_id: String,
    #[serde(default)]
    vaccine_id: Option<String>,
    #[serde(default)]
    preferred_at_ms: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

async fn create_request(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CreateRequestBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let guardian_phone = session.require_guardian()?.to_string();
    let change = state
        .run(move |store| {
            store.appointment_request_create(AppointmentRequestCreateRequest {
                guardian_phone,
                child_id: body.child_id,
                vaccine_id: body.vaccine_id,
                preferred_at_ms: body.preferred_at_ms,
                message: body.message,
            })
        })
        .await?;
    tracing::info!(request = %change.request.id, child = %change.request.child_id, "appointment requested");
    Ok(created(appointment_request_json(&change.request)))
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
    let phone = session.require_guardian()?.to_string();
    let status = parse_opt(
        query.status.as_deref(),
        RequestStatus::parse,
        "status must be pending, accepted or rejected",
    )?;
    let requests = state
        .run(move |store| {
            store.appointment_requests_list(AppointmentRequestsListRequest {
                scope: Scope::Guardian(phone),
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

/// Campaigns running now that target the nation or an area one of the guardian's children
/// lives in.
async fn list_campaigns(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let phone = session.require_guardian()?.to_string();
    let campaigns = state
        .run(move |store| {
            let audience = store.guardian_campaign_audience(&phone)?;
            store.campaigns_list(CampaignsListRequest {
                audience,
                active_at_ms: Some(now_ms()),
                limit: 0,
                offset: 0,
            })
        })
        .await?;
    Ok(ok(json!({ "campaigns": campaigns.iter().map(campaign_json).collect::<Vec<_>>() })))
}
