#![forbid(unsafe_code)]

use super::{ApiJson, ApiQuery, created, ok, parse_opt, parse_required};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::user_json;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::Role;
use vt_core::scope::Location;
use vt_storage::{UserCreateRequest, UserSetActiveRequest, UsersListRequest};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/active", post(set_active))
}

#[derive(Deserialize)]
struct CreateUserBody {
    name: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
    role: String,
    password: String,
    #[serde(default)]
    health_center: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// Supervisors create accounts strictly below their own rank. Location levels the caller
/// already pins (their own region or district) are filled in when omitted.
async fn create_user(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CreateUserBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    session.require_at_least(Role::District)?;
    let role = parse_required(&body.role, Role::parse, "role is invalid")?;
    let own = &session.actor.location;
    let location = Location {
        health_center: body.health_center,
        district: body.district.or_else(|| own.district.clone()),
        region: body.region.or_else(|| own.region.clone()),
    };
    if !session.actor.can_manage(role, &location) {
        return Err(ApiError::Forbidden(
            "cannot create an account at this role or location",
        ));
    }

    let user = state
        .run(move |store| {
            store.user_create(UserCreateRequest {
                name: body.name,
                email: body.email,
                phone: body.phone,
                role,
                location,
                password: body.password,
            })
        })
        .await?;
    tracing::info!(user = %user.id, role = user.role.as_str(), by = session.subject(), "user created");
    Ok(created(user_json(&user)))
}

#[derive(Deserialize)]
struct ListUsersQuery {
    role: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_users(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<Value>, ApiError> {
    session.require_at_least(Role::District)?;
    let scope = session.scope()?;
    let role = parse_opt(query.role.as_deref(), Role::parse, "role is invalid")?;
    let users = state
        .run(move |store| {
            store.users_list(UsersListRequest {
                scope,
                role,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({ "users": users.iter().map(user_json).collect::<Vec<_>>() })))
}

async fn get_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    session.require_staff()?;
    let user = state.run(move |store| store.user_get(&id)).await?;
    let is_self = user.id == session.actor.subject;
    if !is_self && !session.actor.can_manage(user.role, &user.location) {
        return Err(ApiError::UnknownId);
    }
    Ok(ok(user_json(&user)))
}

#[derive(Deserialize)]
struct SetActiveBody {
    active: bool,
    #[serde(default)]
    expected_revision: Option<i64>,
}

async fn set_active(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SetActiveBody>,
) -> Result<Json<Value>, ApiError> {
    session.require_at_least(Role::District)?;
    let lookup = id.clone();
    let target = state.run(move |store| store.user_get(&lookup)).await?;
    if !session.actor.can_manage(target.role, &target.location) {
        return Err(ApiError::UnknownId);
    }
    let user = state
        .run(move |store| {
            store.user_set_active(UserSetActiveRequest {
                id,
                expected_revision: body.expected_revision,
                active: body.active,
            })
        })
        .await?;
    tracing::info!(user = %user.id, active = user.active, by = session.subject(), "user activation changed");
    Ok(ok(user_json(&user)))
}
