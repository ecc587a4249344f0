#![forbid(unsafe_code)]

#[derive(Clone, Debug, Default)]
pub struct SweepReport {
    pub missed_vaccinations: Vec<String>,
    pub missed_appointments: Vec<String>,
    pub children_scanned: usize,
    pub status_changes: usize,
    pub notifications: usize,
    pub sessions_expired: usize,
    /// `<id>: <error>` for items that could not be processed; they are retried next sweep.
    pub failures: Vec<String>,
}
