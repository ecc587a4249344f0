#![forbid(unsafe_code)]

//! The one place a child's vaccination status is derived. Storage calls this on every write
//! that touches a child's vaccinations or appointments, and the sweeper calls it for
//! time-driven changes; nothing else computes status.

use crate::model::ChildStatus;
use crate::schedule::{DoseKey, PlannedDose};
use std::collections::BTreeSet;

const HOUR_MS: i64 = 3_600_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusPolicy {
    /// Half-width of the window around the next appointment in which a child is `due_now`.
    pub due_now_window_ms: i64,
    /// How long after its date a scheduled item stays scheduled before the sweeper marks it
    /// missed.
    pub missed_grace_ms: i64,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            due_now_window_ms: 24 * HOUR_MS,
            missed_grace_ms: 0,
        }
    }
}

impl StatusPolicy {
    /// Scheduled items dated strictly before this instant are overdue at `now_ms`.
    pub fn missed_cutoff(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.missed_grace_ms.max(0))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StatusInputs<'a> {
    pub due: &'a [PlannedDose],
    pub done: &'a BTreeSet<DoseKey>,
    pub next_appointment_ms: Option<i64>,
    pub now_ms: i64,
}

pub fn outstanding<'a>(due: &'a [PlannedDose], done: &BTreeSet<DoseKey>) -> Vec<&'a PlannedDose> {
    due.iter().filter(|dose| !done.contains(&dose.key)).collect()
}

pub fn derive_child_status(inputs: &StatusInputs<'_>, policy: &StatusPolicy) -> ChildStatus {
    if inputs.due.iter().all(|dose| inputs.done.contains(&dose.key)) {
        return ChildStatus::UpToDate;
    }
    let Some(next) = inputs.next_appointment_ms else {
        return ChildStatus::Unscheduled;
    };
    let window = policy.due_now_window_ms.max(0);
    if next.abs_diff(inputs.now_ms) <= window.unsigned_abs() {
        ChildStatus::DueNow
    } else {
        ChildStatus::Late
    }
}
