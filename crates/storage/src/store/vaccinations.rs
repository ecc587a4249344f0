#![forbid(unsafe_code)]

use super::child_status::refresh_child_status;
use super::children::child_get_conn;
use super::notifications::enqueue_all_tx;
use super::stock::{ConsumeDoseArgs, consume_dose_tx};
use super::support::{
    check_revision, enum_column, map_insert_conflict, next_id_tx, normalize_id, normalize_limit,
    normalize_optional_id, normalize_optional_text, now_ms, scope_filter, to_sqlite_i64,
};
use super::vaccines::vaccine_get_conn;
use super::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use vt_core::ids::RecordKind;
use vt_core::model::{NotificationKind, VaccinationStatus, VaccinationTransition};
use vt_core::rooms::child_rooms;

const MAX_NOTES_LEN: usize = 1_000;
const MAX_BATCH_LEN: usize = 64;
const MAX_CENTER_LEN: usize = 64;

const VACCINATION_COLUMNS: &str = "v.id, v.revision, v.child_id, v.vaccine_id, x.name, v.dose, \
     v.status, v.scheduled_at_ms, v.done_at_ms, v.batch_number, v.health_center, \
     v.administered_by, v.notes, v.created_by, v.created_at_ms, v.updated_at_ms";

fn read_vaccination_row(row: &Row<'_>) -> rusqlite::Result<VaccinationRow> {
    Ok(VaccinationRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        child_id: row.get(2)?,
        vaccine_id: row.get(3)?,
        vaccine_name: row.get(4)?,
        dose: row.get(5)?,
        status: enum_column(6, "status", row.get(6)?, VaccinationStatus::parse)?,
        scheduled_at_ms: row.get(7)?,
        done_at_ms: row.get(8)?,
        batch_number: row.get(9)?,
        health_center: row.get(10)?,
        administered_by: row.get(11)?,
        notes: row.get(12)?,
        created_by: row.get(13)?,
        created_at_ms: row.get(14)?,
        updated_at_ms: row.get(15)?,
    })
}

fn vaccination_get_conn(conn: &Connection, id: &str) -> Result<VaccinationRow, StoreError> {
    conn.query_row(
        &format!(
            "SELECT {VACCINATION_COLUMNS} FROM vaccinations v \
             JOIN vaccines x ON x.id = v.vaccine_id WHERE v.id=?1"
        ),
        params![id],
        read_vaccination_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

pub(super) fn vaccinations_for_child(
    conn: &Connection,
    child_id: &str,
) -> Result<Vec<VaccinationRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VACCINATION_COLUMNS} FROM vaccinations v \
         JOIN vaccines x ON x.id = v.vaccine_id WHERE v.child_id=?1 \
         ORDER BY COALESCE(v.done_at_ms, v.scheduled_at_ms, v.created_at_ms) ASC, v.id ASC"
    ))?;
    let rows = stmt.query_map(params![child_id], read_vaccination_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn vaccination_message(kind: NotificationKind, row: &VaccinationRow, child: &ChildRow) -> String {
    let dose = format!("{} dose {}", row.vaccine_name, row.dose);
    let name = child.full_name();
    match kind {
        NotificationKind::VaccinationScheduled => format!("{dose} scheduled for {name}"),
        NotificationKind::VaccinationDone => format!("{dose} given to {name}"),
        NotificationKind::VaccinationMissed => format!("{name} missed {dose}"),
        NotificationKind::VaccinationCancelled => format!("{dose} for {name} was cancelled"),
        NotificationKind::VaccinationRescheduled => format!("{dose} for {name} was rescheduled"),
        other => format!("{}: {dose} for {name}", other.title()),
    }
}

/// One notification per (vaccination, status, revision); replays of the same change collapse.
fn vaccination_draft(
    kind: NotificationKind,
    row: &VaccinationRow,
    child: &ChildRow,
) -> NotificationDraft {
    NotificationDraft {
        idempotency_key: format!(
            "vaccination:{}:{}:{}",
            row.id,
            row.status.as_str(),
            row.revision
        ),
        kind,
        message: vaccination_message(kind, row, child),
        child_id: Some(child.id.clone()),
        vaccination_id: Some(row.id.clone()),
        rooms: child_rooms(&child.location, &child.guardian_phone),
        meta: Some(serde_json::json!({
            "vaccine_id": row.vaccine_id,
            "dose": row.dose,
            "status": row.status.as_str(),
            "scheduled_at_ms": row.scheduled_at_ms,
            "done_at_ms": row.done_at_ms,
        })),
    }
}

/// Inputs of a single state change. Fields a transition does not use are ignored.
pub(super) struct TransitionArgs {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub transition: VaccinationTransition,
    pub scheduled_at_ms: Option<i64>,
    pub done_at_ms: Option<i64>,
    pub batch_number: Option<String>,
    pub health_center: Option<String>,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
    pub now_ms: i64,
}

/// Applies one state-machine transition inside the caller's transaction: revision check,
/// transition check, update, stock decrement on completion, status refresh and outbox
/// entries. Nothing is visible until the caller commits.
pub(super) fn transition_tx(
    tx: &Transaction<'_>,
    args: TransitionArgs,
    policy: &StorePolicy,
) -> Result<VaccinationChange, StoreError> {
    let current = vaccination_get_conn(tx, &args.id)?;
    check_revision(args.expected_revision, current.revision)?;
    let target = args.transition.target();
    if !current.status.can_transition(target) {
        return Err(StoreError::InvalidTransition {
            from: current.status.as_str(),
            to: target.as_str(),
        });
    }
    let child = child_get_conn(tx, &current.child_id)?;
    let now = args.now_ms;

    let mut done_at_ms = None;
    let mut administered_by = None;
    let mut health_center = None;
    let mut batch_number = args.batch_number.clone();
    let mut stock_movement = None;
    let mut drafts = Vec::new();
    let mut scheduled_at_ms = None;

    match args.transition {
        VaccinationTransition::Complete => {
            let done_at = args.done_at_ms.unwrap_or(now);
            if done_at > now {
                return Err(StoreError::InvalidInput("done_at is in the future"));
            }
            done_at_ms = Some(done_at);
            administered_by = args.actor_id.clone();
            let center = args
                .health_center
                .clone()
                .or_else(|| child.location.health_center.clone());
            if let Some(center) = center.as_deref() {
                let consumed = consume_dose_tx(
                    tx,
                    ConsumeDoseArgs {
                        vaccine_id: &current.vaccine_id,
                        health_center: center,
                        batch_number: args.batch_number.as_deref(),
                        vaccination_id: &current.id,
                        actor_id: args.actor_id.as_deref(),
                        now_ms: now,
                    },
                )?;
                if let Some(consumed) = consumed {
                    batch_number = Some(consumed.batch_number);
                    stock_movement = Some(consumed.movement);
                    drafts.extend(consumed.low_stock);
                }
            }
            health_center = center;
        }
        VaccinationTransition::Reschedule => {
            let Some(at) = args.scheduled_at_ms else {
                return Err(StoreError::InvalidInput("scheduled_at is required"));
            };
            scheduled_at_ms = Some(at);
        }
        VaccinationTransition::MarkMissed | VaccinationTransition::Cancel => {}
    }

    let conflict_message = match args.transition {
        VaccinationTransition::Complete => "this dose is already done",
        _ => "an open vaccination already exists for this dose",
    };
    let changed = tx
        .execute(
            "UPDATE vaccinations SET revision=?2, status=?3, \
             scheduled_at_ms=COALESCE(?4, scheduled_at_ms), done_at_ms=?5, \
             batch_number=COALESCE(?6, batch_number), health_center=COALESCE(?7, health_center), \
             administered_by=COALESCE(?8, administered_by), notes=COALESCE(?9, notes), \
             updated_at_ms=?10 WHERE id=?1 AND revision=?11",
            params![
                current.id,
                current.revision + 1,
                target.as_str(),
                scheduled_at_ms,
                done_at_ms,
                batch_number,
                health_center,
                administered_by,
                args.notes,
                now,
                current.revision,
            ],
        )
        .map_err(|err| map_insert_conflict(err, conflict_message))?;
    if changed == 0 {
        return Err(StoreError::RevisionMismatch {
            expected: current.revision,
            actual: current.revision + 1,
        });
    }

    let refreshed = refresh_child_status(tx, &child.id, now, policy)?;
    let row = vaccination_get_conn(tx, &current.id)?;
    drafts.insert(
        0,
        vaccination_draft(args.transition.notification_kind(), &row, &child),
    );
    let notifications = enqueue_all_tx(tx, &drafts, now)?;

    Ok(VaccinationChange {
        vaccination: row,
        child_status: refreshed.status,
        next_appointment_ms: refreshed.next_appointment_ms,
        stock_movement,
        notifications,
    })
}

fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, StoreError> {
    normalize_optional_text(notes, MAX_NOTES_LEN, "notes are too long")
}

impl SqliteStore {
    pub fn vaccination_schedule(
        &mut self,
        request: VaccinationScheduleRequest,
    ) -> Result<VaccinationChange, StoreError> {
        let child_id = normalize_id(RecordKind::Child, &request.child_id)?;
        let vaccine_id = normalize_id(RecordKind::Vaccine, &request.vaccine_id)?;
        let notes = normalize_notes(request.notes.as_deref())?;
        if request.dose < 1 {
            return Err(StoreError::InvalidInput("dose must be at least 1"));
        }
        let now = now_ms();
        let policy = self.policy;

        let tx = self.conn.transaction()?;
        let child = child_get_conn(&tx, &child_id)?;
        let vaccine = vaccine_get_conn(&tx, &vaccine_id)?;
        if !vaccine.active {
            return Err(StoreError::InvalidInput("vaccine is inactive"));
        }
        if request.dose > vaccine.doses_required {
            return Err(StoreError::InvalidInput("dose exceeds doses_required"));
        }
        let already_done = tx
            .query_row(
                "SELECT 1 FROM vaccinations \
                 WHERE child_id=?1 AND vaccine_id=?2 AND dose=?3 AND status='done'",
                params![child_id, vaccine_id, request.dose],
                |_| Ok(()),
            )
            .optional()?;
        if already_done.is_some() {
            return Err(StoreError::Conflict("this dose is already done"));
        }

        let status = if request.planned {
            VaccinationStatus::Planned
        } else {
            VaccinationStatus::Scheduled
        };
        let id = next_id_tx(&tx, RecordKind::Vaccination)?;
        tx.execute(
            "INSERT INTO vaccinations(id, revision, child_id, vaccine_id, dose, status, \
             scheduled_at_ms, notes, created_by, created_at_ms, updated_at_ms) \
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id,
                child_id,
                vaccine_id,
                request.dose,
                status.as_str(),
                request.scheduled_at_ms,
                notes,
                request.actor_id,
                now,
            ],
        )
        .map_err(|err| {
            map_insert_conflict(err, "an open vaccination already exists for this dose")
        })?;

        let refreshed = refresh_child_status(&tx, &child_id, now, &policy)?;
        let row = vaccination_get_conn(&tx, &id)?;
        let mut drafts = Vec::new();
        if status == VaccinationStatus::Scheduled {
            drafts.push(vaccination_draft(
                NotificationKind::VaccinationScheduled,
                &row,
                &child,
            ));
        }
        let notifications = enqueue_all_tx(&tx, &drafts, now)?;
        tx.commit()?;

        Ok(VaccinationChange {
            vaccination: row,
            child_status: refreshed.status,
            next_appointment_ms: refreshed.next_appointment_ms,
            stock_movement: None,
            notifications,
        })
    }

    pub fn vaccination_complete(
        &mut self,
        request: VaccinationCompleteRequest,
    ) -> Result<VaccinationChange, StoreError> {
        let batch_number =
            normalize_optional_text(request.batch_number.as_deref(), MAX_BATCH_LEN, "batch_number is too long")?;
        let health_center = normalize_optional_text(
            request.health_center.as_deref(),
            MAX_CENTER_LEN,
            "health_center is too long",
        )?;
        self.apply_transition(TransitionArgs {
            id: normalize_id(RecordKind::Vaccination, &request.id)?,
            expected_revision: request.expected_revision,
            transition: VaccinationTransition::Complete,
            scheduled_at_ms: None,
            done_at_ms: request.done_at_ms,
            batch_number,
            health_center,
            notes: normalize_notes(request.notes.as_deref())?,
            actor_id: request.actor_id,
            now_ms: now_ms(),
        })
    }

    pub fn vaccination_mark_missed(
        &mut self,
        request: VaccinationCloseRequest,
    ) -> Result<VaccinationChange, StoreError> {
        self.close_vaccination(request, VaccinationTransition::MarkMissed)
    }

    pub fn vaccination_cancel(
        &mut self,
        request: VaccinationCloseRequest,
    ) -> Result<VaccinationChange, StoreError> {
        self.close_vaccination(request, VaccinationTransition::Cancel)
    }

    pub fn vaccination_reschedule(
        &mut self,
        request: VaccinationRescheduleRequest,
    ) -> Result<VaccinationChange, StoreError> {
        self.apply_transition(TransitionArgs {
            id: normalize_id(RecordKind::Vaccination, &request.id)?,
            expected_revision: request.expected_revision,
            transition: VaccinationTransition::Reschedule,
            scheduled_at_ms: Some(request.scheduled_at_ms),
            done_at_ms: None,
            batch_number: None,
            health_center: None,
            notes: normalize_notes(request.notes.as_deref())?,
            actor_id: request.actor_id,
            now_ms: now_ms(),
        })
    }

    fn close_vaccination(
        &mut self,
        request: VaccinationCloseRequest,
        transition: VaccinationTransition,
    ) -> Result<VaccinationChange, StoreError> {
        self.apply_transition(TransitionArgs {
            id: normalize_id(RecordKind::Vaccination, &request.id)?,
            expected_revision: request.expected_revision,
            transition,
            scheduled_at_ms: None,
            done_at_ms: None,
            batch_number: None,
            health_center: None,
            notes: normalize_notes(request.notes.as_deref())?,
            actor_id: request.actor_id,
            now_ms: now_ms(),
        })
    }

    fn apply_transition(&mut self, args: TransitionArgs) -> Result<VaccinationChange, StoreError> {
        let policy = self.policy;
        let tx = self.conn.transaction()?;
        let change = transition_tx(&tx, args, &policy)?;
        tx.commit()?;
        Ok(change)
    }

    pub fn vaccination_get(&self, id: &str) -> Result<VaccinationRow, StoreError> {
        let id = normalize_id(RecordKind::Vaccination, id)?;
        vaccination_get_conn(&self.conn, &id)
    }

    pub fn vaccinations_list(
        &self,
        request: VaccinationsListRequest,
    ) -> Result<VaccinationsListResult, StoreError> {
        let filter = scope_filter(&request.scope, "c", Some("c.guardian_phone"));
        let mut sql = format!(
            "SELECT {VACCINATION_COLUMNS} FROM vaccinations v \
             JOIN vaccines x ON x.id = v.vaccine_id \
             JOIN children c ON c.id = v.child_id WHERE {}",
            filter.clause
        );
        let mut values = filter.params;
        if let Some(child_id) = normalize_optional_id(RecordKind::Child, request.child_id.as_deref())? {
            sql.push_str(" AND v.child_id = ?");
            values.push(Value::Text(child_id));
        }
        if let Some(vaccine_id) =
            normalize_optional_id(RecordKind::Vaccine, request.vaccine_id.as_deref())?
        {
            sql.push_str(" AND v.vaccine_id = ?");
            values.push(Value::Text(vaccine_id));
        }
        if let Some(status) = request.status {
            sql.push_str(" AND v.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from_ms) = request.from_ms {
            sql.push_str(" AND COALESCE(v.done_at_ms, v.scheduled_at_ms) >= ?");
            values.push(Value::Integer(from_ms));
        }
        if let Some(to_ms) = request.to_ms {
            sql.push_str(" AND COALESCE(v.done_at_ms, v.scheduled_at_ms) < ?");
            values.push(Value::Integer(to_ms));
        }
        let limit = normalize_limit(request.limit);
        sql.push_str(
            " ORDER BY COALESCE(v.done_at_ms, v.scheduled_at_ms, v.created_at_ms) ASC, v.id ASC \
             LIMIT ? OFFSET ?",
        );
        values.push(Value::Integer(to_sqlite_i64(limit + 1)?));
        values.push(Value::Integer(to_sqlite_i64(request.offset)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_vaccination_row)?;
        let mut vaccinations = rows.collect::<Result<Vec<_>, _>>()?;
        let has_more = vaccinations.len() > limit;
        vaccinations.truncate(limit);
        Ok(VaccinationsListResult {
            vaccinations,
            has_more,
        })
    }
}
