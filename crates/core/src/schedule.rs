#![forbid(unsafe_code)]

//! Dose calendar: which doses of which vaccines a child should have received by a given time.

pub const DAY_MS: i64 = 86_400_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaccineCalendar {
    pub vaccine_id: String,
    pub min_age_days: i64,
    pub doses_required: i64,
    pub dose_interval_days: i64,
}

impl VaccineCalendar {
    /// Due time of `dose` (1-based) for a child born at `birth_ms`.
    pub fn dose_due_at_ms(&self, birth_ms: i64, dose: i64) -> i64 {
        let extra_doses = dose.saturating_sub(1).max(0);
        let age_days = self
            .min_age_days
            .max(0)
            .saturating_add(extra_doses.saturating_mul(self.dose_interval_days.max(0)));
        birth_ms.saturating_add(age_days.saturating_mul(DAY_MS))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoseKey {
    pub vaccine_id: String,
    pub dose: i64,
}

impl DoseKey {
    pub fn new(vaccine_id: impl Into<String>, dose: i64) -> Self {
        Self {
            vaccine_id: vaccine_id.into(),
            dose,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedDose {
    pub key: DoseKey,
    pub due_at_ms: i64,
}

/// Every dose of every vaccine in the calendar, ordered by due time then vaccine id.
pub fn dose_plan(birth_ms: i64, calendar: &[VaccineCalendar]) -> Vec<PlannedDose> {
    let mut out = Vec::new();
    for vaccine in calendar {
        for dose in 1..=vaccine.doses_required.max(1) {
            out.push(PlannedDose {
                key: DoseKey::new(vaccine.vaccine_id.clone(), dose),
                due_at_ms: vaccine.dose_due_at_ms(birth_ms, dose),
            });
        }
    }
    out.sort_by(|a, b| {
        a.due_at_ms
            .cmp(&b.due_at_ms)
            .then_with(|| a.key.cmp(&b.key))
    });
    out
}

/// Doses whose due time is at or before `now_ms`.
pub fn due_doses(birth_ms: i64, now_ms: i64, calendar: &[VaccineCalendar]) -> Vec<PlannedDose> {
    dose_plan(birth_ms, calendar)
        .into_iter()
        .filter(|planned| planned.due_at_ms <= now_ms)
        .collect()
}
