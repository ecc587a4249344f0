#![forbid(unsafe_code)]

use super::appointments::set_appointment_status_tx;
use super::child_status::{load_calendar, refresh_child_status_with};
use super::vaccinations::{TransitionArgs, transition_tx};
use super::*;
use rusqlite::params;
use vt_core::model::{AppointmentStatus, VaccinationTransition};

const CHILD_BATCH_SIZE: i64 = 500;

impl SqliteStore {
    /// Time-driven maintenance, safe to run repeatedly:
    ///
    /// 1. scheduled vaccinations past their date plus grace become `missed` (one transaction
    ///    each, with their notification);
    /// 2. scheduled appointments past their date plus grace become `missed`;
    /// 3. every child's status is re-derived against `now_ms`, in batches;
    /// 4. expired sessions are dropped.
    ///
    /// A failing item is reported and left for the next sweep.
    pub fn sweep(&mut self, now_ms: i64) -> Result<SweepReport, StoreError> {
        let policy = self.policy;
        let cutoff = policy.status.missed_cutoff(now_ms);
        let mut report = SweepReport::default();

        let overdue = self.overdue_ids(
            "SELECT id, revision FROM vaccinations \
             WHERE status='scheduled' AND scheduled_at_ms IS NOT NULL AND scheduled_at_ms < ?1 \
             ORDER BY scheduled_at_ms ASC, id ASC",
            cutoff,
        )?;
        for (id, revision) in overdue {
            let tx = self.conn.transaction()?;
            let result = transition_tx(
                &tx,
                TransitionArgs {
                    id: id.clone(),
                    expected_revision: Some(revision),
                    transition: VaccinationTransition::MarkMissed,
                    scheduled_at_ms: None,
                    done_at_ms: None,
                    batch_number: None,
                    health_center: None,
                    notes: None,
                    actor_id: None,
                    now_ms,
                },
                &policy,
            );
            match result.and_then(|change| tx.commit().map(|_| change).map_err(StoreError::from)) {
                Ok(change) => {
                    report.notifications += change.notifications.len();
                    report.missed_vaccinations.push(id);
                }
                Err(err) => report.failures.push(format!("{id}: {err}")),
            }
        }

        let overdue = self.overdue_ids(
            "SELECT id, revision FROM appointments \
             WHERE status='scheduled' AND scheduled_at_ms < ?1 \
             ORDER BY scheduled_at_ms ASC, id ASC",
            cutoff,
        )?;
        for (id, revision) in overdue {
            let tx = self.conn.transaction()?;
            let result = set_appointment_status_tx(
                &tx,
                &id,
                Some(revision),
                AppointmentStatus::Missed,
                now_ms,
                &policy,
            );
            match result.and_then(|change| tx.commit().map(|_| change).map_err(StoreError::from)) {
                Ok(_) => report.missed_appointments.push(id),
                Err(err) => report.failures.push(format!("{id}: {err}")),
            }
        }

        let calendar = load_calendar(&self.conn)?;
        let mut after_id = String::new();
        loop {
            let batch = {
                let mut stmt = self.conn.prepare(
                    "SELECT id FROM children WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![after_id, CHILD_BATCH_SIZE], |row| {
                    row.get::<_, String>(0)
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            let Some(last) = batch.last().cloned() else {
                break;
            };

            let tx = self.conn.transaction()?;
            for child_id in &batch {
                match refresh_child_status_with(&tx, child_id, &calendar, now_ms, &policy) {
                    Ok(refresh) => {
                        report.children_scanned += 1;
                        if refresh.changed {
                            report.status_changes += 1;
                        }
                    }
                    Err(err) => report.failures.push(format!("{child_id}: {err}")),
                }
            }
            tx.commit()?;

            if i64::try_from(batch.len()).unwrap_or(i64::MAX) < CHILD_BATCH_SIZE {
                break;
            }
            after_id = last;
        }

        report.sessions_expired = self.sessions_purge_expired(now_ms)?;
        Ok(report)
    }

    fn overdue_ids(&self, sql: &str, cutoff: i64) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
