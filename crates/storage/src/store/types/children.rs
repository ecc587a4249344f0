#![forbid(unsafe_code)]

use super::VaccinationRow;
use vt_core::model::{ChildStatus, Gender};
use vt_core::scope::{Location, Scope};

#[derive(Clone, Debug)]
pub struct ChildRow {
    pub id: String,
    pub revision: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth_date_ms: i64,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub address: Option<String>,
    pub location: Location,
    pub status: ChildStatus,
    pub next_appointment_ms: Option<i64>,
    pub status_updated_at_ms: i64,
    pub created_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ChildRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug)]
pub struct ChildCreateRequest {
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth_date_ms: i64,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub address: Option<String>,
    pub location: Location,
    pub created_by: Option<String>,
}

/// `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct ChildUpdateRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date_ms: Option<i64>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<String>,
    pub location: Option<Location>,
}

#[derive(Clone, Debug)]
pub struct ChildrenListRequest {
    pub scope: Scope,
    pub status: Option<ChildStatus>,
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct ChildrenListResult {
    pub children: Vec<ChildRow>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoseProgress {
    Done,
    Scheduled,
    Overdue,
    Upcoming,
}

impl DoseProgress {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Scheduled => "scheduled",
            Self::Overdue => "overdue",
            Self::Upcoming => "upcoming",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DoseState {
    pub vaccine_id: String,
    pub vaccine_name: String,
    pub dose: i64,
    pub due_at_ms: i64,
    pub progress: DoseProgress,
}

#[derive(Clone, Debug)]
pub struct ChildDetail {
    pub child: ChildRow,
    pub vaccinations: Vec<VaccinationRow>,
    pub doses: Vec<DoseState>,
    pub outstanding: usize,
}
