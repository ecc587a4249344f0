#![forbid(unsafe_code)]

//! Routing keys of the real-time channel.
//!
//! Record rooms (`center:`, `district:`, `region:`, `national`) carry events about records at
//! a location and are listened to by the one staff level that owns that location. Broadcast
//! rooms (`broadcast:…`) carry announcements aimed downward (campaigns) and are listened to by
//! everyone located beneath them.

use crate::model::Role;
use crate::scope::{Actor, Location};

pub const NATIONAL_ROOM: &str = "national";
pub const NATIONAL_BROADCAST_ROOM: &str = "broadcast:national";

pub fn center_room(health_center: &str) -> String {
    format!("center:{health_center}")
}

pub fn district_room(district: &str) -> String {
    format!("district:{district}")
}

pub fn region_room(region: &str) -> String {
    format!("region:{region}")
}

pub fn guardian_room(phone: &str) -> String {
    format!("guardian:{phone}")
}

pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

pub fn location_rooms(location: &Location) -> Vec<String> {
    let mut out = Vec::with_capacity(4);
    if let Some(center) = location.health_center.as_deref() {
        out.push(center_room(center));
    }
    if let Some(district) = location.district.as_deref() {
        out.push(district_room(district));
    }
    if let Some(region) = location.region.as_deref() {
        out.push(region_room(region));
    }
    out.push(NATIONAL_ROOM.to_string());
    out
}

pub fn child_rooms(location: &Location, guardian_phone: &str) -> Vec<String> {
    let mut out = location_rooms(location);
    out.push(guardian_room(guardian_phone));
    out
}

/// Rooms for an announcement targeted at `district` or `region` (the narrower wins), or at the
/// whole country when neither is set. Supervisors above the target see it too.
pub fn broadcast_rooms(district: Option<&str>, region: Option<&str>) -> Vec<String> {
    let mut out = Vec::with_capacity(4);
    match (district, region) {
        (Some(district), region) => {
            out.push(format!("broadcast:district:{district}"));
            out.push(district_room(district));
            if let Some(region) = region {
                out.push(region_room(region));
            }
        }
        (None, Some(region)) => {
            out.push(format!("broadcast:region:{region}"));
            out.push(region_room(region));
        }
        (None, None) => out.push(NATIONAL_BROADCAST_ROOM.to_string()),
    }
    out.push(NATIONAL_ROOM.to_string());
    out
}

pub fn actor_rooms(actor: &Actor) -> Vec<String> {
    let location = &actor.location;
    let mut out = Vec::with_capacity(6);
    match actor.role {
        Role::User => {
            out.push(guardian_room(&actor.subject));
            return out;
        }
        Role::Agent => {
            if let Some(center) = location.health_center.as_deref() {
                out.push(center_room(center));
            }
        }
        Role::District => {
            if let Some(district) = location.district.as_deref() {
                out.push(district_room(district));
            }
        }
        Role::Regional => {
            if let Some(region) = location.region.as_deref() {
                out.push(region_room(region));
            }
        }
        Role::National => out.push(NATIONAL_ROOM.to_string()),
    }
    out.push(user_room(&actor.subject));
    if let Some(district) = location.district.as_deref()
        && actor.role.rank() <= Role::District.rank()
    {
        out.push(format!("broadcast:district:{district}"));
    }
    if let Some(region) = location.region.as_deref()
        && actor.role.rank() <= Role::Regional.rank()
    {
        out.push(format!("broadcast:region:{region}"));
    }
    out.push(NATIONAL_BROADCAST_ROOM.to_string());
    out
}

pub fn intersects(listening: &[String], targets: &[String]) -> bool {
    targets.iter().any(|room| listening.contains(room))
}
