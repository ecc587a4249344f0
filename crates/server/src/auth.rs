#![forbid(unsafe_code)]

use crate::error::ApiError;
use crate::state::AppState;
use crate::time::now_ms;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use vt_core::model::Role;
use vt_core::rooms::actor_rooms;
use vt_core::scope::{Actor, Location, Scope};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct Session {
    pub actor: Actor,
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated("missing bearer token"))?;
        let lookup = token.clone();
        let actor = state
            .run(move |store| store.session_resolve(&lookup, now_ms()))
            .await
            .map_err(|err| match err {
                ApiError::Internal(detail) => ApiError::Internal(detail),
                _ => ApiError::Unauthenticated("session expired or revoked"),
            })?;
        Ok(Self { actor, token })
    }
}

impl Session {
    pub fn subject(&self) -> &str {
        &self.actor.subject
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.actor.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("staff only"))
        }
    }

    pub fn require_at_least(&self, role: Role) -> Result<(), ApiError> {
        if self.actor.at_least(role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("role too low for this operation"))
        }
    }

    /// The guardian's phone number.
    pub fn require_guardian(&self) -> Result<&str, ApiError> {
        if self.actor.role == Role::User {
            Ok(&self.actor.subject)
        } else {
            Err(ApiError::Forbidden("guardians only"))
        }
    }

    pub fn scope(&self) -> Result<Scope, ApiError> {
        self.actor
            .scope()
            .ok_or(ApiError::Forbidden("account has no location assigned"))
    }

    pub fn staff_scope(&self) -> Result<Scope, ApiError> {
        self.require_staff()?;
        self.scope()
    }

    /// Records outside the caller's scope look the same as missing ones.
    pub fn ensure_visible(
        &self,
        location: &Location,
        guardian_phone: Option<&str>,
    ) -> Result<(), ApiError> {
        if self.actor.can_see(location, guardian_phone) {
            Ok(())
        } else {
            Err(ApiError::UnknownId)
        }
    }

    /// Resolves a location named in a request body. Levels at or above the caller's scope are
    /// pinned to the caller's own values; the rest default to them.
    pub fn pin_location(&self, requested: Location) -> Result<Location, ApiError> {
        let scope = self.staff_scope()?;
        let (center, district, region) = match scope {
            Scope::National => (false, false, false),
            Scope::Region(_) => (false, false, true),
            Scope::District(_) => (false, true, true),
            Scope::HealthCenter(_) => (true, true, true),
            Scope::Guardian(_) => return Err(ApiError::Forbidden("staff only")),
        };
        let own = &self.actor.location;
        let location = Location {
            health_center: pin_level(center, requested.health_center, &own.health_center)?,
            district: pin_level(district, requested.district, &own.district)?,
            region: pin_level(region, requested.region, &own.region)?,
        };
        if !scope.covers(&location) {
            return Err(ApiError::Forbidden("location is outside your scope"));
        }
        Ok(location)
    }

    pub fn rooms(&self) -> Vec<String> {
        actor_rooms(&self.actor)
    }

    /// The id notifications are marked read under.
    pub fn reader(&self) -> String {
        match self.actor.role {
            Role::User => format!("guardian:{}", self.actor.subject),
            _ => self.actor.subject.clone(),
        }
    }
}

fn pin_level(
    pinned: bool,
    requested: Option<String>,
    own: &Option<String>,
) -> Result<Option<String>, ApiError> {
    let requested = requested.filter(|value| !value.trim().is_empty());
    match requested {
        Some(value) if pinned && own.as_deref() != Some(value.trim()) => {
            Err(ApiError::Forbidden("location is outside your scope"))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(own.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(header) = header {
            builder = builder.header(AUTHORIZATION, header);
        }
        builder.body(()).expect("request").into_parts().0
    }

    fn session(role: Role, location: Location) -> Session {
        Session {
            actor: Actor {
                subject: "USR-0001".to_string(),
                role,
                location,
            },
            token: "t".to_string(),
        }
    }

    fn partial(district: &str, region: &str) -> Location {
        Location {
            health_center: None,
            district: Some(district.to_string()),
            region: Some(region.to_string()),
        }
    }

    #[test]
    fn agents_cannot_name_another_district_or_region() {
        let agent = session(Role::Agent, Location::new("hc-north", "d-1", "r-1"));
        assert!(matches!(
            agent.pin_location(partial("d-9", "r-9")),
            Err(ApiError::Forbidden(_))
        ));
        assert_eq!(
            agent.pin_location(Location::default()).expect("own location"),
            Location::new("hc-north", "d-1", "r-1")
        );
        assert_eq!(
            agent.pin_location(partial("d-1", "r-1")).expect("same district"),
            Location::new("hc-north", "d-1", "r-1")
        );
    }

    #[test]
    fn supervisors_choose_below_their_level_only() {
        let district = session(Role::District, Location::new("hc-north", "d-1", "r-1"));
        let chosen = district
            .pin_location(Location::new("hc-west", "d-1", "r-1"))
            .expect("center in district");
        assert_eq!(chosen.health_center.as_deref(), Some("hc-west"));
        assert!(matches!(
            district.pin_location(Location::new("hc-west", "d-1", "r-9")),
            Err(ApiError::Forbidden(_))
        ));

        let national = session(Role::National, Location::default());
        assert_eq!(
            national
                .pin_location(Location::new("hc-x", "d-9", "r-9"))
                .expect("anywhere"),
            Location::new("hc-x", "d-9", "r-9")
        );
    }

    #[test]
    fn reads_bearer_tokens_only() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))).as_deref(), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc "))).as_deref(), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
