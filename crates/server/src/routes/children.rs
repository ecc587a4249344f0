#![forbid(unsafe_code)]

use super::{ApiJson, ApiQuery, created, ok, parse_opt};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{child_detail_json, child_json};
use crate::state::AppState;
use crate::time::now_ms;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::{ChildStatus, Gender, Role};
use vt_core::scope::Location;
use vt_storage::{ChildCreateRequest, ChildRow, ChildUpdateRequest, ChildrenListRequest};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/children", post(create_child).get(list_children))
        .route(
            "/children/{id}",
            get(get_child).patch(update_child).delete(delete_child),
        )
        .route("/children/{id}/guardian-pin", post(set_guardian_pin))
}

#[derive(Deserialize)]
struct LocationBody {
    #[serde(default)]
    health_center: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

impl LocationBody {
    fn into_location(self) -> Location {
        Location {
            health_center: self.health_center,
            district: self.district,
            region: self.region,
        }
    }
}

/// Staff below national level register children at their own location unless they name one
/// inside their scope.
fn resolve_location(session: &Session, body: Option<LocationBody>) -> Result<Location, ApiError> {
    session.pin_location(body.map(LocationBody::into_location).unwrap_or_default())
}

pub(super) async fn visible_child(
    state: &AppState,
    session: &Session,
    id: String,
) -> Result<ChildRow, ApiError> {
    let child = state.run(move |store| store.child_get(&id)).await?;
    session.ensure_visible(&child.location, Some(&child.guardian_phone))?;
    Ok(child)
}

#[derive(Deserialize)]
struct CreateChildBody {
    first_name: String,
    last_name: String,
    gender: String,
    birth_date_ms: i64,
    guardian_name: String,
    guardian_phone: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    location: Option<LocationBody>,
}

async fn create_child(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CreateChildBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    session.require_staff()?;
    let gender = Gender::parse(&body.gender).ok_or_else(|| ApiError::invalid("gender is invalid"))?;
    let location = resolve_location(&session, body.location)?;
    let created_by = Some(session.subject().to_string());
    let child = state
        .run(move |store| {
            store.child_create(ChildCreateRequest {
                first_name: body.first_name,
                last_name: body.last_name,
                gender,
                birth_date_ms: body.birth_date_ms,
                guardian_name: body.guardian_name,
                guardian_phone: body.guardian_phone,
                address: body.address,
                location,
                created_by,
            })
        })
        .await?;
    tracing::info!(child = %child.id, status = child.status.as_str(), "child registered");
    Ok(created(child_json(&child)))
}

#[derive(Deserialize)]
struct ListChildrenQuery {
    status: Option<String>,
    search: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_children(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListChildrenQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let status = parse_opt(query.status.as_deref(), ChildStatus::parse, "status is invalid")?;
    let result = state
        .run(move |store| {
            store.children_list(ChildrenListRequest {
                scope,
                status,
                search: query.search,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({
        "children": result.children.iter().map(child_json).collect::<Vec<_>>(),
        "total": result.total,
        "has_more": result.has_more,
    })))
}

async fn get_child(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    session.require_staff()?;
    let child = visible_child(&state, &session, id).await?;
    let detail = state
        .run(move |store| store.child_detail(&child.id, now_ms()))
        .await?;
    Ok(ok(child_detail_json(&detail)))
}

#[derive(Deserialize)]
struct UpdateChildBody {
    #[serde(default)]
    expected_revision: Option<i64>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    birth_date_ms: Option<i64>,
    #[serde(default)]
    guardian_name: Option<String>,
    #[serde(default)]
    guardian_phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    location: Option<LocationBody>,
}

async fn update_child(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateChildBody>,
) -> Result<Json<Value>, ApiError> {
    session.require_staff()?;
    let current = visible_child(&state, &session, id).await?;
    let gender = parse_opt(body.gender.as_deref(), Gender::parse, "gender is invalid")?;
    let location = match body.location {
        Some(location) => Some(resolve_location(&session, Some(location))?),
        None => None,
    };
    let child = state
        .run(move |store| {
            store.child_update(ChildUpdateRequest {
                id: current.id,
                expected_revision: body.expected_revision,
                first_name: body.first_name,
                last_name: body.last_name,
                gender,
                birth_date_ms: body.birth_date_ms,
                guardian_name: body.guardian_name,
                guardian_phone: body.guardian_phone,
                address: body.address,
                location,
            })
        })
        .await?;
    Ok(ok(child_json(&child)))
}

#[derive(Deserialize)]
struct DeleteQuery {
    expected_revision: Option<i64>,
}

async fn delete_child(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> Result<Json<Value>, ApiError> {
    session.require_at_least(Role::District)?;
    let child = visible_child(&state, &session, id).await?;
    let id = child.id.clone();
    state
        .run(move |store| store.child_delete(&child.id, query.expected_revision))
        .await?;
    tracing::info!(child = %id, by = session.subject(), "child deleted");
    Ok(ok(json!({ "deleted": id })))
}

#[derive(Deserialize)]
struct GuardianPinBody {
    pin: String,
}

async fn set_guardian_pin(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<GuardianPinBody>,
) -> Result<Json<Value>, ApiError> {
    session.require_staff()?;
    let child = visible_child(&state, &session, id).await?;
    let phone = child.guardian_phone.clone();
    state
        .run(move |store| store.guardian_pin_set(&child.guardian_phone, &body.pin))
        .await?;
    Ok(ok(json!({ "phone": phone, "pin_set": true })))
}
