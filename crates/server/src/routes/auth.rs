#![forbid(unsafe_code)]

use super::{ApiJson, ok};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::{location_json, user_json};
use crate::state::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::Role;
use vt_storage::{SessionCreateRequest, SessionSubject};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<Value>, ApiError> {
    let ttl_ms = state.config.session_ttl_ms();
    let (user, session) = state
        .run(move |store| {
            let user = store.user_authenticate(&body.email, &body.password)?;
            let session = store.session_create(SessionCreateRequest {
                subject: SessionSubject::User(user.id.clone()),
                ttl_ms,
            })?;
            Ok((user, session))
        })
        .await?;
    tracing::info!(user = %user.id, role = user.role.as_str(), "staff login");
    Ok(ok(json!({
        "token": session.token,
        "expires_at_ms": session.expires_at_ms,
        "user": user_json(&user),
    })))
}

async fn logout(State(state): State<AppState>, session: Session) -> Result<Json<Value>, ApiError> {
    let token = session.token;
    let revoked = state.run(move |store| store.session_revoke(&token)).await?;
    Ok(ok(json!({ "revoked": revoked })))
}

async fn me(State(state): State<AppState>, session: Session) -> Result<Json<Value>, ApiError> {
    let actor = session.actor.clone();
    if actor.role == Role::User {
        let phone = actor.subject.clone();
        let children = state
            .run(move |store| store.children_for_guardian(&phone))
            .await?;
        return Ok(ok(json!({
            "role": actor.role.as_str(),
            "phone": actor.subject,
            "children": children.iter().map(|child| child.id.clone()).collect::<Vec<_>>(),
            "rooms": session.rooms(),
        })));
    }
    let id = actor.subject.clone();
    let user = state.run(move |store| store.user_get(&id)).await?;
    Ok(ok(json!({
        "role": actor.role.as_str(),
        "user": user_json(&user),
        "location": location_json(&actor.location),
        "rooms": session.rooms(),
    })))
}
