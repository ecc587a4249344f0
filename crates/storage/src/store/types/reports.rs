#![forbid(unsafe_code)]

use vt_core::scope::{GroupLevel, Scope};

#[derive(Clone, Debug)]
pub struct CoverageRequest {
    pub scope: Scope,
    pub vaccine_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub up_to_date: u64,
    pub late: u64,
    pub unscheduled: u64,
    pub due_now: u64,
}

#[derive(Clone, Debug)]
pub struct CoverageReport {
    pub total_children: u64,
    pub vaccinated_children: u64,
    /// Percentage with two decimals; 0 when there are no children.
    pub coverage_rate: f64,
    pub by_status: StatusCounts,
    pub done_vaccinations: u64,
    pub missed_vaccinations: u64,
}

#[derive(Clone, Debug)]
pub struct BreakdownRow {
    pub group: String,
    pub total_children: u64,
    pub vaccinated_children: u64,
    pub coverage_rate: f64,
    pub done_vaccinations: u64,
    pub missed_vaccinations: u64,
}

#[derive(Clone, Debug)]
pub struct BreakdownReport {
    pub level: GroupLevel,
    pub rows: Vec<BreakdownRow>,
}
