#![forbid(unsafe_code)]

use super::{ApiJson, ApiQuery, created, ok};
use crate::auth::Session;
use crate::error::ApiError;
use crate::render::campaign_json;
use crate::state::AppState;
use crate::time::now_ms;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use vt_core::model::Role;
use vt_core::scope::{Location, Scope};
use vt_storage::{CampaignAudience, CampaignCreateRequest, CampaignsListRequest};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", post(create_campaign).get(list_campaigns))
        .route("/campaigns/{id}", delete(delete_campaign))
}

/// What a staff member may see: national campaigns, their own areas, and everything inside
/// their scope.
fn staff_audience(scope: &Scope, location: &Location) -> CampaignAudience {
    let mut audience = CampaignAudience::default();
    match scope {
        Scope::National => audience.all = true,
        Scope::Region(region) => audience.regions_full.push(region.clone()),
        Scope::District(_) | Scope::HealthCenter(_) | Scope::Guardian(_) => {
            audience.regions.extend(location.region.clone());
            audience.districts.extend(location.district.clone());
        }
    }
    audience
}

#[derive(Deserialize)]
struct CreateCampaignBody {
    title: String,
    description: String,
    #[serde(default)]
    vaccine_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    district: Option<String>,
    starts_at_ms: i64,
    ends_at_ms: i64,
}

/// Regional users target their own region (or a district inside it); national users target
/// anything.
async fn create_campaign(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CreateCampaignBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    session.require_at_least(Role::Regional)?;
    let mut region = body.region;
    if session.actor.role == Role::Regional {
        let own = session.actor.location.region.clone();
        if region.is_some() && region != own {
            return Err(ApiError::Forbidden("campaign target is outside your region"));
        }
        region = own;
    }
    let actor_id = Some(session.subject().to_string());
    let change = state
        .run(move |store| {
            store.campaign_create(CampaignCreateRequest {
                title: body.title,
                description: body.description,
                vaccine_id: body.vaccine_id,
                region,
                district: body.district,
                starts_at_ms: body.starts_at_ms,
                ends_at_ms: body.ends_at_ms,
                actor_id,
            })
        })
        .await?;
    tracing::info!(campaign = %change.campaign.id, by = session.subject(), "campaign created");
    Ok(created(campaign_json(&change.campaign)))
}

#[derive(Deserialize)]
struct ListCampaignsQuery {
    #[serde(default)]
    active_only: bool,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_campaigns(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListCampaignsQuery>,
) -> Result<Json<Value>, ApiError> {
    let scope = session.staff_scope()?;
    let audience = staff_audience(&scope, &session.actor.location);
    let active_at_ms = query.active_only.then(now_ms);
    let campaigns = state
        .run(move |store| {
            store.campaigns_list(CampaignsListRequest {
                audience,
                active_at_ms,
                limit: query.limit.unwrap_or(0),
                offset: query.offset.unwrap_or(0),
            })
        })
        .await?;
    Ok(ok(json!({ "campaigns": campaigns.iter().map(campaign_json).collect::<Vec<_>>() })))
}

async fn delete_campaign(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    session.require_at_least(Role::Regional)?;
    let lookup = id.clone();
    let campaign = state.run(move |store| store.campaign_get(&lookup)).await?;
    if session.actor.role == Role::Regional && campaign.region != session.actor.location.region {
        return Err(ApiError::Forbidden("campaign belongs to another region"));
    }
    state.run(move |store| store.campaign_delete(&id)).await?;
    Ok(ok(json!({ "deleted": campaign.id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audiences_follow_scope() {
        let national = staff_audience(&Scope::National, &Location::default());
        assert!(national.all);

        let regional = staff_audience(
            &Scope::Region("r-1".to_string()),
            &Location {
                region: Some("r-1".to_string()),
                ..Location::default()
            },
        );
        assert_eq!(regional.regions_full, vec!["r-1".to_string()]);

        let agent_location = Location::new("hc-1", "d-1", "r-1");
        let agent = staff_audience(&Scope::HealthCenter("hc-1".to_string()), &agent_location);
        assert!(!agent.all);
        assert_eq!(agent.regions, vec!["r-1".to_string()]);
        assert_eq!(agent.districts, vec!["d-1".to_string()]);
    }
}
