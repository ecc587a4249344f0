#![forbid(unsafe_code)]

use super::NotificationRow;
use vt_core::model::{AppointmentStatus, ChildStatus, RequestStatus};
use vt_core::scope::Scope;

#[derive(Clone, Debug)]
pub struct AppointmentRow {
    pub id: String,
    pub revision: i64,
    pub child_id: String,
    pub vaccine_id: Option<String>,
    pub scheduled_at_ms: i64,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub request_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentCreateRequest {
    pub child_id: String,
    pub vaccine_id: Option<String>,
    pub scheduled_at_ms: i64,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppointmentSetStatusRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub status: AppointmentStatus,
}

#[derive(Clone, Debug)]
pub struct AppointmentsListRequest {
    pub scope: Scope,
    pub child_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct AppointmentChange {
    pub appointment: AppointmentRow,
    pub child_status: ChildStatus,
    pub notifications: Vec<NotificationRow>,
}

#[derive(Clone, Debug)]
pub struct AppointmentRequestRow {
    pub id: String,
    pub revision: i64,
    pub child_id: String,
    pub guardian_phone: String,
    pub vaccine_id: Option<String>,
    pub preferred_at_ms: Option<i64>,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub response_note: Option<String>,
    pub appointment_id: Option<String>,
    pub answered_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentRequestCreateRequest {
    pub guardian_phone: String,
    pub child_id: String,
    pub vaccine_id: Option<String>,
    pub preferred_at_ms: Option<i64>,
    pub message: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppointmentRequestAnswerRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub accept: bool,
    /// Falls back to the guardian's preferred time when accepting.
    pub scheduled_at_ms: Option<i64>,
    pub note: Option<String>,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppointmentRequestsListRequest {
    pub scope: Scope,
    pub status: Option<RequestStatus>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct AppointmentRequestChange {
    pub request: AppointmentRequestRow,
    pub appointment: Option<AppointmentRow>,
    pub notifications: Vec<NotificationRow>,
}
