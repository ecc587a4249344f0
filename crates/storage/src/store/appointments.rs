#![forbid(unsafe_code)]

use super::child_status::refresh_child_status;
use super::children::child_get_conn;
use super::notifications::enqueue_all_tx;
use super::support::{
    check_revision, enum_column, next_id_tx, normalize_id, normalize_limit,
    normalize_optional_id, normalize_optional_text, now_ms, scope_filter, to_sqlite_i64,
};
use super::vaccines::vaccine_get_conn;
use super::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use vt_core::ids::RecordKind;
use vt_core::model::{AppointmentStatus, NotificationKind};
use vt_core::rooms::child_rooms;

const MAX_APPOINTMENT_NOTES_LEN: usize = 1_000;

const APPOINTMENT_COLUMNS: &str = "a.id, a.revision, a.child_id, a.vaccine_id, \
     a.scheduled_at_ms, a.status, a.notes, a.request_id, a.created_by, a.created_at_ms, \
     a.updated_at_ms";

fn read_appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        child_id: row.get(2)?,
        vaccine_id: row.get(3)?,
        scheduled_at_ms: row.get(4)?,
        status: enum_column(5, "status", row.get(5)?, AppointmentStatus::parse)?,
        notes: row.get(6)?,
        request_id: row.get(7)?,
        created_by: row.get(8)?,
        created_at_ms: row.get(9)?,
        updated_at_ms: row.get(10)?,
    })
}

pub(super) fn appointment_get_conn(
    conn: &Connection,
    id: &str,
) -> Result<AppointmentRow, StoreError> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id=?1"),
        params![id],
        read_appointment_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

pub(super) struct NewAppointment<'a> {
    pub child: &'a ChildRow,
    pub vaccine_id: Option<String>,
    pub scheduled_at_ms: i64,
    pub notes: Option<String>,
    pub request_id: Option<String>,
    pub actor_id: Option<String>,
    pub now_ms: i64,
}

/// Inserts a scheduled appointment and its notification. The caller refreshes the child's
/// status and commits.
pub(super) fn insert_appointment_tx(
    tx: &Transaction<'_>,
    appointment: NewAppointment<'_>,
) -> Result<(AppointmentRow, NotificationDraft), StoreError> {
    let vaccine_name = match appointment.vaccine_id.as_deref() {
        Some(vaccine_id) => Some(vaccine_get_conn(tx, vaccine_id)?.name),
        None => None,
    };
    let id = next_id_tx(tx, RecordKind::Appointment)?;
    tx.execute(
        "INSERT INTO appointments(id, revision, child_id, vaccine_id, scheduled_at_ms, status, \
         notes, request_id, created_by, created_at_ms, updated_at_ms) \
         VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            appointment.child.id,
            appointment.vaccine_id,
            appointment.scheduled_at_ms,
            AppointmentStatus::Scheduled.as_str(),
            appointment.notes,
            appointment.request_id,
            appointment.actor_id,
            appointment.now_ms,
        ],
    )?;
    let row = appointment_get_conn(tx, &id)?;
    let child = appointment.child;
    let message = match vaccine_name {
        Some(vaccine) => format!("{} has an appointment for {vaccine}", child.full_name()),
        None => format!("{} has a new appointment", child.full_name()),
    };
    let draft = NotificationDraft {
        idempotency_key: format!("appointment:{id}:scheduled:0"),
        kind: NotificationKind::AppointmentScheduled,
        message,
        child_id: Some(child.id.clone()),
        vaccination_id: None,
        rooms: child_rooms(&child.location, &child.guardian_phone),
        meta: Some(serde_json::json!({
            "appointment_id": id,
            "scheduled_at_ms": appointment.scheduled_at_ms,
            "vaccine_id": row.vaccine_id,
        })),
    };
    Ok((row, draft))
}

impl SqliteStore {
    pub fn appointment_create(
        &mut self,
        request: AppointmentCreateRequest,
    ) -> Result<AppointmentChange, StoreError> {
        let child_id = normalize_id(RecordKind::Child, &request.child_id)?;
        let vaccine_id = normalize_optional_id(RecordKind::Vaccine, request.vaccine_id.as_deref())?;
        let notes = normalize_optional_text(
            request.notes.as_deref(),
            MAX_APPOINTMENT_NOTES_LEN,
            "notes are too long",
        )?;
        let now = now_ms();
        let policy = self.policy;

        let tx = self.conn.transaction()?;
        let child = child_get_conn(&tx, &child_id)?;
        let (appointment, draft) = insert_appointment_tx(
            &tx,
            NewAppointment {
                child: &child,
                vaccine_id,
                scheduled_at_ms: request.scheduled_at_ms,
                notes,
                request_id: None,
                actor_id: request.actor_id,
                now_ms: now,
            },
        )?;
        let refreshed = refresh_child_status(&tx, &child_id, now, &policy)?;
        let notifications = enqueue_all_tx(&tx, &[draft], now)?;
        tx.commit()?;

        Ok(AppointmentChange {
            appointment,
            child_status: refreshed.status,
            notifications,
        })
    }

    pub fn appointment_get(&self, id: &str) -> Result<AppointmentRow, StoreError> {
        let id = normalize_id(RecordKind::Appointment, id)?;
        appointment_get_conn(&self.conn, &id)
    }

    /// Closes a scheduled appointment as completed, missed or cancelled.
    pub fn appointment_set_status(
        &mut self,
        request: AppointmentSetStatusRequest,
    ) -> Result<AppointmentChange, StoreError> {
        let id = normalize_id(RecordKind::Appointment, &request.id)?;
        let now = now_ms();
        let policy = self.policy;
        let tx = self.conn.transaction()?;
        let change = set_appointment_status_tx(
            &tx,
            &id,
            request.expected_revision,
            request.status,
            now,
            &policy,
        )?;
        tx.commit()?;
        Ok(change)
    }

    pub fn appointments_list(
        &self,
        request: AppointmentsListRequest,
    ) -> Result<Vec<AppointmentRow>, StoreError> {
        let filter = scope_filter(&request.scope, "c", Some("c.guardian_phone"));
        let mut sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments a \
             JOIN children c ON c.id = a.child_id WHERE {}",
            filter.clause
        );
        let mut values = filter.params;
        if let Some(child_id) = normalize_optional_id(RecordKind::Child, request.child_id.as_deref())? {
            sql.push_str(" AND a.child_id = ?");
            values.push(Value::Text(child_id));
        }
        if let Some(status) = request.status {
            sql.push_str(" AND a.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from_ms) = request.from_ms {
            sql.push_str(" AND a.scheduled_at_ms >= ?");
            values.push(Value::Integer(from_ms));
        }
        if let Some(to_ms) = request.to_ms {
            sql.push_str(" AND a.scheduled_at_ms < ?");
            values.push(Value::Integer(to_ms));
        }
        sql.push_str(" ORDER BY a.scheduled_at_ms ASC, a.id ASC LIMIT ? OFFSET ?");
        values.push(Value::Integer(to_sqlite_i64(normalize_limit(request.limit))?));
        values.push(Value::Integer(to_sqlite_i64(request.offset)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_appointment_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

pub(super) fn set_appointment_status_tx(
    tx: &Transaction<'_>,
    id: &str,
    expected_revision: Option<i64>,
    status: AppointmentStatus,
    now_ms: i64,
    policy: &StorePolicy,
) -> Result<AppointmentChange, StoreError> {
    let current = appointment_get_conn(tx, id)?;
    check_revision(expected_revision, current.revision)?;
    if current.status != AppointmentStatus::Scheduled || status == AppointmentStatus::Scheduled {
        return Err(StoreError::InvalidTransition {
            from: current.status.as_str(),
            to: status.as_str(),
        });
    }
    tx.execute(
        "UPDATE appointments SET status=?2, revision=?3, updated_at_ms=?4 WHERE id=?1",
        params![id, status.as_str(), current.revision + 1, now_ms],
    )?;
    let refreshed = refresh_child_status(tx, &current.child_id, now_ms, policy)?;
    let appointment = appointment_get_conn(tx, id)?;
    Ok(AppointmentChange {
        appointment,
        child_status: refreshed.status,
        notifications: Vec::new(),
    })
}
