#![forbid(unsafe_code)]

use super::child_status::{done_doses, load_calendar, refresh_child_status};
use super::support::{
    check_revision, enum_column, next_id_tx, normalize_full_location, normalize_id,
    normalize_limit, normalize_optional_text, normalize_phone_input, normalize_required_text,
    now_ms, scope_filter, to_sqlite_i64,
};
use super::vaccinations::vaccinations_for_child;
use super::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::{BTreeMap, BTreeSet};
use vt_core::ids::RecordKind;
use vt_core::model::{ChildStatus, Gender};
use vt_core::schedule::{DoseKey, dose_plan};
use vt_core::scope::Location;

const MAX_PERSON_NAME_LEN: usize = 80;
const MAX_ADDRESS_LEN: usize = 300;
const MAX_SEARCH_LEN: usize = 80;

pub(super) const CHILD_COLUMNS: &str = "c.id, c.revision, c.first_name, c.last_name, c.gender, \
     c.birth_date_ms, c.guardian_name, c.guardian_phone, c.address, c.health_center, \
     c.district, c.region, c.status, c.next_appointment_ms, c.status_updated_at_ms, \
     c.created_by, c.created_at_ms, c.updated_at_ms";

pub(super) fn read_child_row(row: &Row<'_>) -> rusqlite::Result<ChildRow> {
    Ok(ChildRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        gender: enum_column(4, "gender", row.get(4)?, Gender::parse)?,
        birth_date_ms: row.get(5)?,
        guardian_name: row.get(6)?,
        guardian_phone: row.get(7)?,
        address: row.get(8)?,
        location: Location {
            health_center: row.get(9)?,
            district: row.get(10)?,
            region: row.get(11)?,
        },
        status: enum_column(12, "status", row.get(12)?, ChildStatus::parse)?,
        next_appointment_ms: row.get(13)?,
        status_updated_at_ms: row.get(14)?,
        created_by: row.get(15)?,
        created_at_ms: row.get(16)?,
        updated_at_ms: row.get(17)?,
    })
}

pub(super) fn child_get_conn(conn: &Connection, id: &str) -> Result<ChildRow, StoreError> {
    conn.query_row(
        &format!("SELECT {CHILD_COLUMNS} FROM children c WHERE c.id=?1"),
        params![id],
        read_child_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

fn validate_birth_date(birth_date_ms: i64, now_ms: i64) -> Result<(), StoreError> {
    if birth_date_ms > now_ms {
        return Err(StoreError::InvalidInput("birth_date is in the future"));
    }
    Ok(())
}

fn normalize_person_name(value: &str, message: &'static str) -> Result<String, StoreError> {
    normalize_required_text(value, MAX_PERSON_NAME_LEN, message)
}

impl SqliteStore {
    pub fn child_create(&mut self, request: ChildCreateRequest) -> Result<ChildRow, StoreError> {
        let first_name = normalize_person_name(&request.first_name, "first_name is invalid")?;
        let last_name = normalize_person_name(&request.last_name, "last_name is invalid")?;
        let guardian_name =
            normalize_person_name(&request.guardian_name, "guardian_name is invalid")?;
        let guardian_phone = normalize_phone_input(&request.guardian_phone)?;
        let address = normalize_optional_text(
            request.address.as_deref(),
            MAX_ADDRESS_LEN,
            "address is too long",
        )?;
        let (health_center, district, region) = normalize_full_location(&request.location)?;
        let now = now_ms();
        validate_birth_date(request.birth_date_ms, now)?;
        let policy = self.policy;

        let tx = self.conn.transaction()?;
        let id = next_id_tx(&tx, RecordKind::Child)?;
        tx.execute(
            "INSERT INTO children(id, revision, first_name, last_name, gender, birth_date_ms, \
             guardian_name, guardian_phone, address, health_center, district, region, status, \
             next_appointment_ms, status_updated_at_ms, created_by, created_at_ms, updated_at_ms) \
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13, ?14, ?13, ?13)",
            params![
                id,
                first_name,
                last_name,
                request.gender.as_str(),
                request.birth_date_ms,
                guardian_name,
                guardian_phone,
                address,
                health_center,
                district,
                region,
                ChildStatus::Unscheduled.as_str(),
                now,
                request.created_by,
            ],
        )?;
        refresh_child_status(&tx, &id, now, &policy)?;
        let row = child_get_conn(&tx, &id)?;
        tx.commit()?;
        Ok(row)
    }

    pub fn child_get(&self, id: &str) -> Result<ChildRow, StoreError> {
        let id = normalize_id(RecordKind::Child, id)?;
        child_get_conn(&self.conn, &id)
    }

    /// The child with its vaccination history and per-dose progress against the calendar.
    pub fn child_detail(&self, id: &str, now_ms: i64) -> Result<ChildDetail, StoreError> {
        let child = self.child_get(id)?;
        let vaccinations = vaccinations_for_child(&self.conn, &child.id)?;
        let calendar = load_calendar(&self.conn)?;
        let done = done_doses(&self.conn, &child.id)?;
        let open = vaccinations
            .iter()
            .filter(|row| row.status.is_open())
            .map(|row| DoseKey::new(row.vaccine_id.clone(), row.dose))
            .collect::<BTreeSet<_>>();
        let names = self
            .vaccines_list(true)?
            .into_iter()
            .map(|vaccine| (vaccine.id, vaccine.name))
            .collect::<BTreeMap<_, _>>();

        let mut outstanding = 0;
        let doses = dose_plan(child.birth_date_ms, &calendar)
            .into_iter()
            .map(|planned| {
                let progress = if done.contains(&planned.key) {
                    DoseProgress::Done
                } else if open.contains(&planned.key) {
                    DoseProgress::Scheduled
                } else if planned.due_at_ms <= now_ms {
                    DoseProgress::Overdue
                } else {
                    DoseProgress::Upcoming
                };
                if progress != DoseProgress::Done && planned.due_at_ms <= now_ms {
                    outstanding += 1;
                }
                DoseState {
                    vaccine_name: names
                        .get(&planned.key.vaccine_id)
                        .cloned()
                        .unwrap_or_default(),
                    vaccine_id: planned.key.vaccine_id,
                    dose: planned.key.dose,
                    due_at_ms: planned.due_at_ms,
                    progress,
                }
            })
            .collect::<Vec<_>>();

        Ok(ChildDetail {
            child,
            vaccinations,
            doses,
            outstanding,
        })
    }

    pub fn children_list(
        &self,
        request: ChildrenListRequest,
    ) -> Result<ChildrenListResult, StoreError> {
        let filter = scope_filter(&request.scope, "c", Some("c.guardian_phone"));
        let mut where_sql = filter.clause;
        let mut values = filter.params;
        if let Some(status) = request.status {
            where_sql.push_str(" AND c.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(search) =
            normalize_optional_text(request.search.as_deref(), MAX_SEARCH_LEN, "search is too long")?
        {
            let pattern = format!("%{}%", search.to_lowercase());
            where_sql.push_str(
                " AND (lower(c.first_name || ' ' || c.last_name) LIKE ? \
                 OR c.guardian_phone LIKE ? OR lower(c.id) LIKE ?)",
            );
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }

        let total = self.conn.query_row(
            &format!("SELECT COUNT(1) FROM children c WHERE {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get::<_, i64>(0),
        )?;

        let limit = normalize_limit(request.limit);
        let mut page_values = values;
        page_values.push(Value::Integer(to_sqlite_i64(limit + 1)?));
        page_values.push(Value::Integer(to_sqlite_i64(request.offset)?));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHILD_COLUMNS} FROM children c WHERE {where_sql} \
             ORDER BY c.last_name ASC, c.first_name ASC, c.id ASC LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(page_values), read_child_row)?;
        let mut children = rows.collect::<Result<Vec<_>, _>>()?;
        let has_more = children.len() > limit;
        children.truncate(limit);

        Ok(ChildrenListResult {
            children,
            total: u64::try_from(total).unwrap_or(0),
            has_more,
        })
    }

    pub fn children_for_guardian(&self, phone: &str) -> Result<Vec<ChildRow>, StoreError> {
        let phone = normalize_phone_input(phone)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHILD_COLUMNS} FROM children c WHERE c.guardian_phone=?1 \
             ORDER BY c.birth_date_ms ASC, c.id ASC"
        ))?;
        let rows = stmt.query_map(params![phone], read_child_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn child_update(&mut self, request: ChildUpdateRequest) -> Result<ChildRow, StoreError> {
        let id = normalize_id(RecordKind::Child, &request.id)?;
        let now = now_ms();
        let policy = self.policy;
        let tx = self.conn.transaction()?;
        let current = child_get_conn(&tx, &id)?;
        check_revision(request.expected_revision, current.revision)?;

        let first_name = match request.first_name.as_deref() {
            Some(value) => normalize_person_name(value, "first_name is invalid")?,
            None => current.first_name,
        };
        let last_name = match request.last_name.as_deref() {
            Some(value) => normalize_person_name(value, "last_name is invalid")?,
            None => current.last_name,
        };
        let guardian_name = match request.guardian_name.as_deref() {
            Some(value) => normalize_person_name(value, "guardian_name is invalid")?,
            None => current.guardian_name,
        };
        let guardian_phone = match request.guardian_phone.as_deref() {
            Some(value) => normalize_phone_input(value)?,
            None => current.guardian_phone,
        };
        let address = match request.address.as_deref() {
            Some(value) => normalize_optional_text(Some(value), MAX_ADDRESS_LEN, "address is too long")?,
            None => current.address,
        };
        let (health_center, district, region) = match request.location.as_ref() {
            Some(location) => normalize_full_location(location)?,
            None => normalize_full_location(&current.location)?,
        };
        let birth_date_ms = request.birth_date_ms.unwrap_or(current.birth_date_ms);
        validate_birth_date(birth_date_ms, now)?;
        let gender = request.gender.unwrap_or(current.gender);

        tx.execute(
            "UPDATE children SET revision=?2, first_name=?3, last_name=?4, gender=?5, \
             birth_date_ms=?6, guardian_name=?7, guardian_phone=?8, address=?9, \
             health_center=?10, district=?11, region=?12, updated_at_ms=?13 WHERE id=?1",
            params![
                id,
                current.revision + 1,
                first_name,
                last_name,
                gender.as_str(),
                birth_date_ms,
                guardian_name,
                guardian_phone,
                address,
                health_center,
                district,
                region,
                now,
            ],
        )?;
        if birth_date_ms != current.birth_date_ms {
            refresh_child_status(&tx, &id, now, &policy)?;
        }
        let row = child_get_conn(&tx, &id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Removes the child with its vaccinations, appointments and requests.
    pub fn child_delete(&mut self, id: &str, expected_revision: Option<i64>) -> Result<(), StoreError> {
        let id = normalize_id(RecordKind::Child, id)?;
        let tx = self.conn.transaction()?;
        let current = child_get_conn(&tx, &id)?;
        check_revision(expected_revision, current.revision)?;
        tx.execute("DELETE FROM children WHERE id=?1", params![id])?;
        tx.commit()?;
        Ok(())
    }
}
