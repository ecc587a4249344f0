#![forbid(unsafe_code)]

use vt_core::model::Role;
use vt_core::scope::{Actor, Location, Scope};

#[derive(Clone, Debug)]
pub struct UserRow {
    pub id: String,
    pub revision: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub location: Location,
    pub active: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl UserRow {
    pub fn actor(&self) -> Actor {
        Actor {
            subject: self.id.clone(),
            role: self.role,
            location: self.location.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserCreateRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub location: Location,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct UsersListRequest {
    pub scope: Scope,
    pub role: Option<Role>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct UserSetActiveRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionSubject {
    User(String),
    Guardian(String),
}

#[derive(Clone, Debug)]
pub struct SessionCreateRequest {
    pub subject: SessionSubject,
    pub ttl_ms: i64,
}

#[derive(Clone, Debug)]
pub struct SessionIssued {
    pub token: String,
    pub expires_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct GuardianLookup {
    pub phone: String,
    pub children: u64,
    pub pin_set: bool,
}
