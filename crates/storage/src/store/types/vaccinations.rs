#![forbid(unsafe_code)]

use super::{NotificationRow, StockMovementRow};
use vt_core::model::{ChildStatus, VaccinationStatus};
use vt_core::scope::Scope;

#[derive(Clone, Debug)]
pub struct VaccinationRow {
    pub id: String,
    pub revision: i64,
    pub child_id: String,
    pub vaccine_id: String,
    pub vaccine_name: String,
    pub dose: i64,
    pub status: VaccinationStatus,
    pub scheduled_at_ms: Option<i64>,
    pub done_at_ms: Option<i64>,
    pub batch_number: Option<String>,
    pub health_center: Option<String>,
    pub administered_by: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct VaccinationScheduleRequest {
    pub child_id: String,
    pub vaccine_id: String,
    pub dose: i64,
    pub scheduled_at_ms: i64,
    /// Planned records are placeholders: no notification, still count as open.
    pub planned: bool,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct VaccinationCompleteRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub done_at_ms: Option<i64>,
    pub batch_number: Option<String>,
    /// Where the dose was given; defaults to the child's health center.
    pub health_center: Option<String>,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
}

/// Mark missed, or cancel.
#[derive(Clone, Debug, Default)]
pub struct VaccinationCloseRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct VaccinationRescheduleRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub scheduled_at_ms: i64,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct VaccinationsListRequest {
    pub scope: Scope,
    pub child_id: Option<String>,
    pub vaccine_id: Option<String>,
    pub status: Option<VaccinationStatus>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct VaccinationsListResult {
    pub vaccinations: Vec<VaccinationRow>,
    pub has_more: bool,
}

/// Everything a vaccination write changed, committed together.
#[derive(Clone, Debug)]
pub struct VaccinationChange {
    pub vaccination: VaccinationRow,
    pub child_status: ChildStatus,
    pub next_appointment_ms: Option<i64>,
    pub stock_movement: Option<StockMovementRow>,
    pub notifications: Vec<NotificationRow>,
}
