#![forbid(unsafe_code)]

use super::support::enum_column;
use super::*;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use vt_core::model::ChildStatus;
use vt_core::schedule::{DoseKey, VaccineCalendar, due_doses};
use vt_core::status::{StatusInputs, derive_child_status};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ChildStatusRefresh {
    pub status: ChildStatus,
    pub next_appointment_ms: Option<i64>,
    pub changed: bool,
}

/// The active vaccine catalog as a dose calendar.
pub(super) fn load_calendar(conn: &Connection) -> Result<Vec<VaccineCalendar>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, min_age_days, doses_required, dose_interval_days \
         FROM vaccines WHERE active=1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(VaccineCalendar {
            vaccine_id: row.get(0)?,
            min_age_days: row.get(1)?,
            doses_required: row.get(2)?,
            dose_interval_days: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(super) fn done_doses(conn: &Connection, child_id: &str) -> Result<BTreeSet<DoseKey>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT vaccine_id, dose FROM vaccinations WHERE child_id=?1 AND status='done'",
    )?;
    let rows = stmt.query_map(params![child_id], |row| {
        Ok(DoseKey::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    Ok(rows.collect::<Result<BTreeSet<_>, _>>()?)
}

/// Earliest time among open vaccinations and scheduled appointments.
pub(super) fn next_appointment_ms(
    conn: &Connection,
    child_id: &str,
) -> Result<Option<i64>, StoreError> {
    let next = conn.query_row(
        "SELECT MIN(t) FROM ( \
           SELECT scheduled_at_ms AS t FROM vaccinations \
            WHERE child_id=?1 AND status IN ('planned', 'scheduled') AND scheduled_at_ms IS NOT NULL \
           UNION ALL \
           SELECT scheduled_at_ms AS t FROM appointments \
            WHERE child_id=?1 AND status='scheduled' \
         )",
        params![child_id],
        |row| row.get::<_, Option<i64>>(0),
    )?;
    Ok(next)
}

/// Re-derives and stores one child's status. Every write that can change a child's status
/// calls this inside its own transaction, and the sweeper calls it for time-driven changes.
/// Status is derived data: the child's revision is left alone.
pub(super) fn refresh_child_status_with(
    conn: &Connection,
    child_id: &str,
    calendar: &[VaccineCalendar],
    now_ms: i64,
    policy: &StorePolicy,
) -> Result<ChildStatusRefresh, StoreError> {
    let current = conn
        .query_row(
            "SELECT birth_date_ms, status, next_appointment_ms FROM children WHERE id=?1",
            params![child_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    enum_column(1, "status", row.get::<_, String>(1)?, ChildStatus::parse)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((birth_date_ms, previous_status, previous_next)) = current else {
        return Err(StoreError::UnknownId);
    };

    let due = due_doses(birth_date_ms, now_ms, calendar);
    let done = done_doses(conn, child_id)?;
    let next = next_appointment_ms(conn, child_id)?;
    let status = derive_child_status(
        &StatusInputs {
            due: &due,
            done: &done,
            next_appointment_ms: next,
            now_ms,
        },
        &policy.status,
    );

    let changed = status != previous_status || next != previous_next;
    if changed {
        conn.execute(
            "UPDATE children SET status=?2, next_appointment_ms=?3, status_updated_at_ms=?4 \
             WHERE id=?1",
            params![child_id, status.as_str(), next, now_ms],
        )?;
    }

    Ok(ChildStatusRefresh {
        status,
        next_appointment_ms: next,
        changed,
    })
}

pub(super) fn refresh_child_status(
    conn: &Connection,
    child_id: &str,
    now_ms: i64,
    policy: &StorePolicy,
) -> Result<ChildStatusRefresh, StoreError> {
    let calendar = load_calendar(conn)?;
    refresh_child_status_with(conn, child_id, &calendar, now_ms, policy)
}
