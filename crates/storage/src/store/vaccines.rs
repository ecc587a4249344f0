#![forbid(unsafe_code)]

use super::support::{
    bool_to_i64, check_revision, map_insert_conflict, next_id_tx, normalize_id,
    normalize_optional_text, normalize_required_text, now_ms,
};
use super::*;
use rusqlite::{Connection, OptionalExtension, Row, params};
use vt_core::ids::RecordKind;

const MAX_VACCINE_NAME_LEN: usize = 80;
const MAX_VACCINE_DESCRIPTION_LEN: usize = 2_000;
const MAX_AGE_DAYS: i64 = 365 * 18;
const MAX_DOSES: i64 = 10;

const VACCINE_COLUMNS: &str = "id, revision, name, description, min_age_days, doses_required, \
     dose_interval_days, active, created_at_ms, updated_at_ms";

fn read_vaccine_row(row: &Row<'_>) -> rusqlite::Result<VaccineRow> {
    Ok(VaccineRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        min_age_days: row.get(4)?,
        doses_required: row.get(5)?,
        dose_interval_days: row.get(6)?,
        active: row.get(7)?,
        created_at_ms: row.get(8)?,
        updated_at_ms: row.get(9)?,
    })
}

fn validate_calendar(
    min_age_days: i64,
    doses_required: i64,
    dose_interval_days: i64,
) -> Result<(), StoreError> {
    if !(0..=MAX_AGE_DAYS).contains(&min_age_days) {
        return Err(StoreError::InvalidInput("min_age_days is out of range"));
    }
    if !(1..=MAX_DOSES).contains(&doses_required) {
        return Err(StoreError::InvalidInput("doses_required must be 1..=10"));
    }
    if !(0..=MAX_AGE_DAYS).contains(&dose_interval_days) {
        return Err(StoreError::InvalidInput("dose_interval_days is out of range"));
    }
    if doses_required > 1 && dose_interval_days == 0 {
        return Err(StoreError::InvalidInput(
            "multi-dose vaccines need a dose interval",
        ));
    }
    Ok(())
}

pub(super) fn vaccine_get_conn(conn: &Connection, id: &str) -> Result<VaccineRow, StoreError> {
    conn.query_row(
        &format!("SELECT {VACCINE_COLUMNS} FROM vaccines WHERE id=?1"),
        params![id],
        read_vaccine_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

impl SqliteStore {
    pub fn vaccine_create(&mut self, request: VaccineCreateRequest) -> Result<VaccineRow, StoreError> {
        let name = normalize_required_text(&request.name, MAX_VACCINE_NAME_LEN, "name is invalid")?;
        let description = normalize_optional_text(
            request.description.as_deref(),
            MAX_VACCINE_DESCRIPTION_LEN,
            "description is too long",
        )?;
        validate_calendar(
            request.min_age_days,
            request.doses_required,
            request.dose_interval_days,
        )?;
        let now = now_ms();

        let tx = self.conn.transaction()?;
        let id = next_id_tx(&tx, RecordKind::Vaccine)?;
        tx.execute(
            "INSERT INTO vaccines(id, revision, name, description, min_age_days, doses_required, \
             dose_interval_days, active, created_at_ms, updated_at_ms) \
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                id,
                name,
                description,
                request.min_age_days,
                request.doses_required,
                request.dose_interval_days,
                now,
            ],
        )
        .map_err(|err| map_insert_conflict(err, "vaccine name already exists"))?;
        let row = vaccine_get_conn(&tx, &id)?;
        tx.commit()?;
        Ok(row)
    }

    pub fn vaccine_get(&self, id: &str) -> Result<VaccineRow, StoreError> {
        let id = normalize_id(RecordKind::Vaccine, id)?;
        vaccine_get_conn(&self.conn, &id)
    }

    pub fn vaccines_list(&self, include_inactive: bool) -> Result<Vec<VaccineRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VACCINE_COLUMNS} FROM vaccines \
             WHERE (?1 OR active=1) ORDER BY min_age_days ASC, name ASC"
        ))?;
        let rows = stmt.query_map(params![include_inactive], read_vaccine_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Calendar edits change what counts as due for every child; stored statuses catch up on
    /// the next sweep.
    pub fn vaccine_update(&mut self, request: VaccineUpdateRequest) -> Result<VaccineRow, StoreError> {
        let id = normalize_id(RecordKind::Vaccine, &request.id)?;
        let tx = self.conn.transaction()?;
        let current = vaccine_get_conn(&tx, &id)?;
        check_revision(request.expected_revision, current.revision)?;

        let name = match request.name.as_deref() {
            Some(name) => normalize_required_text(name, MAX_VACCINE_NAME_LEN, "name is invalid")?,
            None => current.name,
        };
        let description = match request.description.as_deref() {
            Some(description) => normalize_optional_text(
                Some(description),
                MAX_VACCINE_DESCRIPTION_LEN,
                "description is too long",
            )?,
            None => current.description,
        };
        let min_age_days = request.min_age_days.unwrap_or(current.min_age_days);
        let doses_required = request.doses_required.unwrap_or(current.doses_required);
        let dose_interval_days = request
            .dose_interval_days
            .unwrap_or(current.dose_interval_days);
        validate_calendar(min_age_days, doses_required, dose_interval_days)?;
        let active = request.active.unwrap_or(current.active);

        tx.execute(
            "UPDATE vaccines SET revision=?2, name=?3, description=?4, min_age_days=?5, \
             doses_required=?6, dose_interval_days=?7, active=?8, updated_at_ms=?9 WHERE id=?1",
            params![
                id,
                current.revision + 1,
                name,
                description,
                min_age_days,
                doses_required,
                dose_interval_days,
                bool_to_i64(active),
                now_ms(),
            ],
        )
        .map_err(|err| map_insert_conflict(err, "vaccine name already exists"))?;
        let row = vaccine_get_conn(&tx, &id)?;
        tx.commit()?;
        Ok(row)
    }
}
