#![forbid(unsafe_code)]

use super::notifications::enqueue_all_tx;
use super::support::{
    normalize_id, normalize_limit, normalize_location, normalize_optional_id,
    normalize_phone_input, normalize_required_text, now_ms, next_id_tx, to_sqlite_i64,
};
use super::vaccines::vaccine_get_conn;
use super::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use vt_core::ids::RecordKind;
use vt_core::model::NotificationKind;
use vt_core::rooms::broadcast_rooms;
use vt_core::scope::Location;

const MAX_CAMPAIGN_TITLE_LEN: usize = 120;
const MAX_CAMPAIGN_DESCRIPTION_LEN: usize = 4_000;

const CAMPAIGN_COLUMNS: &str = "m.id, m.revision, m.title, m.description, m.vaccine_id, \
     m.region, m.district, m.starts_at_ms, m.ends_at_ms, m.created_by, m.created_at_ms, \
     m.updated_at_ms";

fn read_campaign_row(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        vaccine_id: row.get(4)?,
        region: row.get(5)?,
        district: row.get(6)?,
        starts_at_ms: row.get(7)?,
        ends_at_ms: row.get(8)?,
        created_by: row.get(9)?,
        created_at_ms: row.get(10)?,
        updated_at_ms: row.get(11)?,
    })
}

fn campaign_get_conn(conn: &Connection, id: &str) -> Result<CampaignRow, StoreError> {
    conn.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns m WHERE m.id=?1"),
        params![id],
        read_campaign_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

fn push_in_clause(sql: &mut Vec<String>, values: &mut Vec<Value>, template: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let placeholders = vec!["?"; items.len()].join(", ");
    sql.push(template.replace("{}", &placeholders));
    values.extend(items.iter().cloned().map(Value::Text));
}

impl SqliteStore {
    /// Creates a campaign and announces it to everyone located under its target area.
    pub fn campaign_create(
        &mut self,
        request: CampaignCreateRequest,
    ) -> Result<CampaignChange, StoreError> {
        let title =
            normalize_required_text(&request.title, MAX_CAMPAIGN_TITLE_LEN, "title is invalid")?;
        let description = normalize_required_text(
            &request.description,
            MAX_CAMPAIGN_DESCRIPTION_LEN,
            "description is invalid",
        )?;
        let vaccine_id = normalize_optional_id(RecordKind::Vaccine, request.vaccine_id.as_deref())?;
        let target = normalize_location(&Location {
            health_center: None,
            district: request.district.clone(),
            region: request.region.clone(),
        })?;
        if target.district.is_some() && target.region.is_none() {
            return Err(StoreError::InvalidInput(
                "district campaigns need their region",
            ));
        }
        if request.ends_at_ms < request.starts_at_ms {
            return Err(StoreError::InvalidInput("campaign ends before it starts"));
        }
        let now = now_ms();

        let tx = self.conn.transaction()?;
        if let Some(vaccine_id) = vaccine_id.as_deref() {
            vaccine_get_conn(&tx, vaccine_id)?;
        }
        let id = next_id_tx(&tx, RecordKind::Campaign)?;
        tx.execute(
            "INSERT INTO campaigns(id, revision, title, description, vaccine_id, region, district, \
             starts_at_ms, ends_at_ms, created_by, created_at_ms, updated_at_ms) \
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                id,
                title,
                description,
                vaccine_id,
                target.region,
                target.district,
                request.starts_at_ms,
                request.ends_at_ms,
                request.actor_id,
                now,
            ],
        )?;
        let campaign = campaign_get_conn(&tx, &id)?;
        let draft = NotificationDraft {
            idempotency_key: format!("campaign:{id}:created:0"),
            kind: NotificationKind::Campaign,
            message: campaign.title.clone(),
            child_id: None,
            vaccination_id: None,
            rooms: broadcast_rooms(campaign.district.as_deref(), campaign.region.as_deref()),
            meta: Some(serde_json::json!({
                "campaign_id": id,
                "starts_at_ms": campaign.starts_at_ms,
                "ends_at_ms": campaign.ends_at_ms,
            })),
        };
        let notifications = enqueue_all_tx(&tx, &[draft], now)?;
        tx.commit()?;

        Ok(CampaignChange {
            campaign,
            notifications,
        })
    }

    pub fn campaign_get(&self, id: &str) -> Result<CampaignRow, StoreError> {
        let id = normalize_id(RecordKind::Campaign, id)?;
        campaign_get_conn(&self.conn, &id)
    }

    pub fn campaign_delete(&mut self, id: &str) -> Result<(), StoreError> {
        let id = normalize_id(RecordKind::Campaign, id)?;
        let removed = self
            .conn
            .execute("DELETE FROM campaigns WHERE id=?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::UnknownId);
        }
        Ok(())
    }

    /// The areas a guardian's children live in.
    pub fn guardian_campaign_audience(&self, phone: &str) -> Result<CampaignAudience, StoreError> {
        let phone = normalize_phone_input(phone)?;
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT region, district FROM children WHERE guardian_phone=?1",
        )?;
        let rows = stmt.query_map(params![phone], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut audience = CampaignAudience::default();
        for row in rows {
            let (region, district) = row?;
            if !audience.regions.contains(&region) {
                audience.regions.push(region);
            }
            if !audience.districts.contains(&district) {
                audience.districts.push(district);
            }
        }
        Ok(audience)
    }

    pub fn campaigns_list(&self, request: CampaignsListRequest) -> Result<Vec<CampaignRow>, StoreError> {
        let audience = &request.audience;
        let mut matches = vec!["(m.region IS NULL AND m.district IS NULL)".to_string()];
        let mut values = Vec::new();
        if audience.all {
            matches.push("1=1".to_string());
        }
        push_in_clause(&mut matches, &mut values, "m.region IN ({})", &audience.regions_full);
        push_in_clause(
            &mut matches,
            &mut values,
            "(m.district IS NULL AND m.region IN ({}))",
            &audience.regions,
        );
        push_in_clause(&mut matches, &mut values, "m.district IN ({})", &audience.districts);

        let mut sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns m WHERE ({})",
            matches.join(" OR ")
        );
        if let Some(at_ms) = request.active_at_ms {
            sql.push_str(" AND m.starts_at_ms <= ? AND m.ends_at_ms >= ?");
            values.push(Value::Integer(at_ms));
            values.push(Value::Integer(at_ms));
        }
        sql.push_str(" ORDER BY m.starts_at_ms DESC, m.id DESC LIMIT ? OFFSET ?");
        values.push(Value::Integer(to_sqlite_i64(normalize_limit(request.limit))?));
        values.push(Value::Integer(to_sqlite_i64(request.offset)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_campaign_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
