#![forbid(unsafe_code)]

use super::appointments::{NewAppointment, insert_appointment_tx};
use super::child_status::refresh_child_status;
use super::children::child_get_conn;
use super::notifications::enqueue_all_tx;
use super::support::{
    check_revision, enum_column, next_id_tx, normalize_id, normalize_limit,
    normalize_optional_id, normalize_optional_text, normalize_phone_input, now_ms,
    scope_filter, to_sqlite_i64,
};
use super::vaccines::vaccine_get_conn;
use super::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use vt_core::ids::RecordKind;
use vt_core::model::{NotificationKind, RequestStatus};
use vt_core::rooms::{guardian_room, location_rooms};

const MAX_REQUEST_MESSAGE_LEN: usize = 500;

const REQUEST_COLUMNS: &str = "r.id, r.revision, r.child_id, r.guardian_phone, r.vaccine_id, \
     r.preferred_at_ms, r.message, r.status, r.response_note, r.appointment_id, \
     r.answered_by, r.created_at_ms, r.updated_at_ms";

fn read_request_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRequestRow> {
    Ok(AppointmentRequestRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        child_id: row.get(2)?,
        guardian_phone: row.get(3)?,
        vaccine_id: row.get(4)?,
        preferred_at_ms: row.get(5)?,
        message: row.get(6)?,
        status: enum_column(7, "status", row.get(7)?, RequestStatus::parse)?,
        response_note: row.get(8)?,
        appointment_id: row.get(9)?,
        answered_by: row.get(10)?,
        created_at_ms: row.get(11)?,
        updated_at_ms: row.get(12)?,
    })
}

fn request_get_conn(conn: &Connection, id: &str) -> Result<AppointmentRequestRow, StoreError> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM appointment_requests r WHERE r.id=?1"),
        params![id],
        read_request_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

impl SqliteStore {
    /// A guardian asks staff for an appointment. The child must be registered under the
    /// guardian's phone; anything else looks like an unknown child. One pending request per
    /// child.
    pub fn appointment_request_create(
        &mut self,
        request: AppointmentRequestCreateRequest,
    ) -> Result<AppointmentRequestChange, StoreError> {
        let phone = normalize_phone_input(&request.guardian_phone)?;
        let child_id = normalize_id(RecordKind::Child, &request.child_id)?;
        let vaccine_id = normalize_optional_id(RecordKind::Vaccine, request.vaccine_id.as_deref())?;
        let message = normalize_optional_text(
            request.message.as_deref(),
            MAX_REQUEST_MESSAGE_LEN,
            "message is too long",
        )?;
        let now = now_ms();

        let tx = self.conn.transaction()?;
        let child = child_get_conn(&tx, &child_id)?;
        if child.guardian_phone != phone {
            return Err(StoreError::UnknownId);
        }
        if let Some(vaccine_id) = vaccine_id.as_deref() {
            vaccine_get_conn(&tx, vaccine_id)?;
        }
        let pending = tx
            .query_row(
                "SELECT 1 FROM appointment_requests WHERE child_id=?1 AND status='pending'",
                params![child_id],
                |_| Ok(()),
            )
            .optional()?;
        if pending.is_some() {
            return Err(StoreError::Conflict(
                "a pending request already exists for this child",
            ));
        }

        let id = next_id_tx(&tx, RecordKind::AppointmentRequest)?;
        tx.execute(
            "INSERT INTO appointment_requests(id, revision, child_id, guardian_phone, vaccine_id, \
             preferred_at_ms, message, status, created_at_ms, updated_at_ms) \
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                child_id,
                phone,
                vaccine_id,
                request.preferred_at_ms,
                message,
                RequestStatus::Pending.as_str(),
                now,
            ],
        )?;
        let row = request_get_conn(&tx, &id)?;
        let draft = NotificationDraft {
            idempotency_key: format!("appointment_request:{id}:pending:0"),
            kind: NotificationKind::AppointmentRequested,
            message: format!("{} requested an appointment for {}", child.guardian_name, child.full_name()),
            child_id: Some(child.id.clone()),
            vaccination_id: None,
            rooms: location_rooms(&child.location),
            meta: Some(serde_json::json!({
                "request_id": id,
                "preferred_at_ms": request.preferred_at_ms,
            })),
        };
        let notifications = enqueue_all_tx(&tx, &[draft], now)?;
        tx.commit()?;

        Ok(AppointmentRequestChange {
            request: row,
            appointment: None,
            notifications,
        })
    }

    pub fn appointment_request_get(&self, id: &str) -> Result<AppointmentRequestRow, StoreError> {
        let id = normalize_id(RecordKind::AppointmentRequest, id)?;
        request_get_conn(&self.conn, &id)
    }

    /// Accepting books an appointment in the same transaction; the guardian is notified
    /// either way.
    pub fn appointment_request_answer(
        &mut self,
        request: AppointmentRequestAnswerRequest,
    ) -> Result<AppointmentRequestChange, StoreError> {
        let id = normalize_id(RecordKind::AppointmentRequest, &request.id)?;
        let note = normalize_optional_text(
            request.note.as_deref(),
            MAX_REQUEST_MESSAGE_LEN,
            "note is too long",
        )?;
        let now = now_ms();
        let policy = self.policy;

        let tx = self.conn.transaction()?;
        let current = request_get_conn(&tx, &id)?;
        check_revision(request.expected_revision, current.revision)?;
        let target = if request.accept {
            RequestStatus::Accepted
        } else {
            RequestStatus::Rejected
        };
        if current.status != RequestStatus::Pending {
            return Err(StoreError::InvalidTransition {
                from: current.status.as_str(),
                to: target.as_str(),
            });
        }
        let child = child_get_conn(&tx, &current.child_id)?;

        let mut drafts = Vec::new();
        let appointment = if request.accept {
            let Some(scheduled_at_ms) = request.scheduled_at_ms.or(current.preferred_at_ms) else {
                return Err(StoreError::InvalidInput(
                    "scheduled_at is required to accept a request without a preferred time",
                ));
            };
            let (appointment, draft) = insert_appointment_tx(
                &tx,
                NewAppointment {
                    child: &child,
                    vaccine_id: current.vaccine_id.clone(),
                    scheduled_at_ms,
                    notes: note.clone(),
                    request_id: Some(id.clone()),
                    actor_id: request.actor_id.clone(),
                    now_ms: now,
                },
            )?;
            drafts.push(draft);
            Some(appointment)
        } else {
            None
        };

        tx.execute(
            "UPDATE appointment_requests SET revision=?2, status=?3, response_note=?4, \
             appointment_id=?5, answered_by=?6, updated_at_ms=?7 WHERE id=?1",
            params![
                id,
                current.revision + 1,
                target.as_str(),
                note,
                appointment.as_ref().map(|row| row.id.clone()),
                request.actor_id,
                now,
            ],
        )?;
        if appointment.is_some() {
            refresh_child_status(&tx, &child.id, now, &policy)?;
        }

        let message = match target {
            RequestStatus::Accepted => {
                format!("Your appointment request for {} was accepted", child.full_name())
            }
            _ => format!("Your appointment request for {} was declined", child.full_name()),
        };
        drafts.push(NotificationDraft {
            idempotency_key: format!("appointment_request:{id}:{}:{}", target.as_str(), current.revision + 1),
            kind: NotificationKind::AppointmentRequestAnswered,
            message,
            child_id: Some(child.id.clone()),
            vaccination_id: None,
            rooms: vec![guardian_room(&current.guardian_phone)],
            meta: Some(serde_json::json!({
                "request_id": id,
                "status": target.as_str(),
                "appointment_id": appointment.as_ref().map(|row| row.id.clone()),
                "scheduled_at_ms": appointment.as_ref().map(|row| row.scheduled_at_ms),
            })),
        });
        let notifications = enqueue_all_tx(&tx, &drafts, now)?;
        let row = request_get_conn(&tx, &id)?;
        tx.commit()?;

        Ok(AppointmentRequestChange {
            request: row,
            appointment,
            notifications,
        })
    }

    pub fn appointment_requests_list(
        &self,
        request: AppointmentRequestsListRequest,
    ) -> Result<Vec<AppointmentRequestRow>, StoreError> {
        let filter = scope_filter(&request.scope, "c", Some("r.guardian_phone"));
        let mut sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM appointment_requests r \
             JOIN children c ON c.id = r.child_id WHERE {}",
            filter.clause
        );
        let mut values = filter.params;
        if let Some(status) = request.status {
            sql.push_str(" AND r.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY r.created_at_ms DESC, r.id DESC LIMIT ? OFFSET ?");
        values.push(Value::Integer(to_sqlite_i64(normalize_limit(request.limit))?));
        values.push(Value::Integer(to_sqlite_i64(request.offset)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_request_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
