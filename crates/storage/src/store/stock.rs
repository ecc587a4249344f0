#![forbid(unsafe_code)]

use super::notifications::enqueue_all_tx;
use super::support::{
    check_revision, map_insert_conflict, next_id_tx, normalize_full_location, normalize_id,
    normalize_limit, normalize_optional_id, normalize_required_text, now_ms, scope_filter,
    to_sqlite_i64,
};
use super::vaccines::vaccine_get_conn;
use super::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use vt_core::ids::RecordKind;
use vt_core::model::NotificationKind;
use vt_core::rooms::location_rooms;
use vt_core::scope::{Location, Scope};
use vt_core::stock::{classify_stock, crossed_threshold};

const MAX_BATCH_LEN: usize = 64;
const MAX_REASON_LEN: usize = 200;
const MAX_RECEIVE_QUANTITY: i64 = 1_000_000;
const VACCINATION_REASON: &str = "vaccination";

const STOCK_COLUMNS: &str = "s.id, s.revision, s.vaccine_id, x.name, s.batch_number, \
     s.health_center, s.district, s.region, s.quantity, s.alert_threshold, s.expires_at_ms, \
     s.created_at_ms, s.updated_at_ms";

fn read_stock_row(row: &Row<'_>) -> rusqlite::Result<StockRow> {
    Ok(StockRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        vaccine_id: row.get(2)?,
        vaccine_name: row.get(3)?,
        batch_number: row.get(4)?,
        location: Location {
            health_center: row.get(5)?,
            district: row.get(6)?,
            region: row.get(7)?,
        },
        quantity: row.get(8)?,
        alert_threshold: row.get(9)?,
        expires_at_ms: row.get(10)?,
        created_at_ms: row.get(11)?,
        updated_at_ms: row.get(12)?,
    })
}

fn stock_get_conn(conn: &Connection, id: &str) -> Result<StockRow, StoreError> {
    conn.query_row(
        &format!(
            "SELECT {STOCK_COLUMNS} FROM stocks s JOIN vaccines x ON x.id = s.vaccine_id \
             WHERE s.id=?1"
        ),
        params![id],
        read_stock_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

fn normalize_batch(raw: &str) -> Result<String, StoreError> {
    normalize_required_text(raw, MAX_BATCH_LEN, "batch_number is invalid")
}

struct MovementArgs<'a> {
    stock_id: &'a str,
    delta: i64,
    quantity_after: i64,
    reason: &'a str,
    vaccination_id: Option<&'a str>,
    actor_id: Option<&'a str>,
    now_ms: i64,
}

fn insert_movement_tx(
    tx: &Transaction<'_>,
    args: MovementArgs<'_>,
) -> Result<StockMovementRow, StoreError> {
    tx.execute(
        "INSERT INTO stock_movements(stock_id, delta, quantity_after, reason, vaccination_id, \
         actor_id, ts_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            args.stock_id,
            args.delta,
            args.quantity_after,
            args.reason,
            args.vaccination_id,
            args.actor_id,
            args.now_ms,
        ],
    )?;
    Ok(StockMovementRow {
        seq: tx.last_insert_rowid(),
        stock_id: args.stock_id.to_string(),
        delta: args.delta,
        quantity_after: args.quantity_after,
        reason: args.reason.to_string(),
        vaccination_id: args.vaccination_id.map(str::to_string),
        actor_id: args.actor_id.map(str::to_string),
        ts_ms: args.now_ms,
    })
}

fn low_stock_draft(stock: &StockRow) -> NotificationDraft {
    NotificationDraft {
        idempotency_key: format!("stock:{}:low:{}", stock.id, stock.revision),
        kind: NotificationKind::StockLow,
        message: format!(
            "{} batch {} is down to {} doses",
            stock.vaccine_name, stock.batch_number, stock.quantity
        ),
        child_id: None,
        vaccination_id: None,
        rooms: location_rooms(&stock.location),
        meta: Some(serde_json::json!({
            "stock_id": stock.id,
            "vaccine_id": stock.vaccine_id,
            "quantity": stock.quantity,
            "alert_threshold": stock.alert_threshold,
        })),
    }
}

pub(super) struct DoseConsumption {
    pub movement: StockMovementRow,
    pub batch_number: String,
    pub low_stock: Option<NotificationDraft>,
}

pub(super) struct ConsumeDoseArgs<'a> {
    pub vaccine_id: &'a str,
    pub health_center: &'a str,
    pub batch_number: Option<&'a str>,
    pub vaccination_id: &'a str,
    pub actor_id: Option<&'a str>,
    pub now_ms: i64,
}

/// Takes one dose from the health center's stock for a completed vaccination. The named batch
/// is used when given, otherwise the usable batch that expires first. Expired and empty rows
/// are never touched. `None` when nothing matches; the vaccination still completes.
pub(super) fn consume_dose_tx(
    tx: &Transaction<'_>,
    args: ConsumeDoseArgs<'_>,
) -> Result<Option<DoseConsumption>, StoreError> {
    let candidate = tx
        .query_row(
            "SELECT id, quantity, alert_threshold FROM stocks \
             WHERE vaccine_id=?1 AND health_center=?2 AND quantity > 0 \
               AND (?3 IS NULL OR batch_number=?3) \
               AND (expires_at_ms IS NULL OR expires_at_ms > ?4) \
             ORDER BY expires_at_ms IS NULL, expires_at_ms ASC, id ASC LIMIT 1",
            params![args.vaccine_id, args.health_center, args.batch_number, args.now_ms],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((stock_id, before, threshold)) = candidate else {
        return Ok(None);
    };

    let changed = tx.execute(
        "UPDATE stocks SET quantity=quantity-1, revision=revision+1, updated_at_ms=?2 \
         WHERE id=?1 AND quantity > 0",
        params![stock_id, args.now_ms],
    )?;
    if changed == 0 {
        return Ok(None);
    }

    let stock = stock_get_conn(tx, &stock_id)?;
    let movement = insert_movement_tx(
        tx,
        MovementArgs {
            stock_id: &stock_id,
            delta: -1,
            quantity_after: stock.quantity,
            reason: VACCINATION_REASON,
            vaccination_id: Some(args.vaccination_id),
            actor_id: args.actor_id,
            now_ms: args.now_ms,
        },
    )?;
    let low_stock =
        crossed_threshold(before, stock.quantity, threshold).then(|| low_stock_draft(&stock));

    Ok(Some(DoseConsumption {
        movement,
        batch_number: stock.batch_number,
        low_stock,
    }))
}

impl SqliteStore {
    /// Receives doses of a batch at a health center. A known (vaccine, center, batch) row is
    /// topped up; expiry and threshold are updated when given.
    pub fn stock_receive(&mut self, request: StockReceiveRequest) -> Result<StockChange, StoreError> {
        let vaccine_id = normalize_id(RecordKind::Vaccine, &request.vaccine_id)?;
        let batch_number = normalize_batch(&request.batch_number)?;
        let (health_center, district, region) = normalize_full_location(&request.location)?;
        if !(1..=MAX_RECEIVE_QUANTITY).contains(&request.quantity) {
            return Err(StoreError::InvalidInput("quantity must be positive"));
        }
        if request.alert_threshold.is_some_and(|value| value < 0) {
            return Err(StoreError::InvalidInput("alert_threshold must not be negative"));
        }
        let default_threshold = self.policy.default_stock_alert_threshold;
        let now = now_ms();

        let tx = self.conn.transaction()?;
        vaccine_get_conn(&tx, &vaccine_id)?;
        let existing = tx
            .query_row(
                "SELECT id FROM stocks WHERE vaccine_id=?1 AND health_center=?2 AND batch_number=?3",
                params![vaccine_id, health_center, batch_number],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        let stock_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE stocks SET quantity=quantity+?2, revision=revision+1, \
                     alert_threshold=COALESCE(?3, alert_threshold), \
                     expires_at_ms=COALESCE(?4, expires_at_ms), updated_at_ms=?5 WHERE id=?1",
                    params![
                        id,
                        request.quantity,
                        request.alert_threshold,
                        request.expires_at_ms,
                        now
                    ],
                )?;
                id
            }
            None => {
                let id = next_id_tx(&tx, RecordKind::Stock)?;
                tx.execute(
                    "INSERT INTO stocks(id, revision, vaccine_id, batch_number, health_center, \
                     district, region, quantity, alert_threshold, expires_at_ms, created_at_ms, \
                     updated_at_ms) VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    params![
                        id,
                        vaccine_id,
                        batch_number,
                        health_center,
                        district,
                        region,
                        request.quantity,
                        request.alert_threshold.unwrap_or(default_threshold),
                        request.expires_at_ms,
                        now,
                    ],
                )
                .map_err(|err| map_insert_conflict(err, "stock row already exists"))?;
                id
            }
        };

        let stock = stock_get_conn(&tx, &stock_id)?;
        let movement = insert_movement_tx(
            &tx,
            MovementArgs {
                stock_id: &stock_id,
                delta: request.quantity,
                quantity_after: stock.quantity,
                reason: "received",
                vaccination_id: None,
                actor_id: request.actor_id.as_deref(),
                now_ms: now,
            },
        )?;
        tx.commit()?;

        Ok(StockChange {
            stock,
            movement,
            notifications: Vec::new(),
        })
    }

    /// Manual correction (loss, breakage, count). Quantity never goes below zero.
    pub fn stock_adjust(&mut self, request: StockAdjustRequest) -> Result<StockChange, StoreError> {
        let id = normalize_id(RecordKind::Stock, &request.id)?;
        let reason = normalize_required_text(&request.reason, MAX_REASON_LEN, "reason is invalid")?;
        if request.delta == 0 {
            return Err(StoreError::InvalidInput("delta must not be zero"));
        }
        let now = now_ms();

        let tx = self.conn.transaction()?;
        let current = stock_get_conn(&tx, &id)?;
        check_revision(request.expected_revision, current.revision)?;
        let after = current.quantity.saturating_add(request.delta);
        if after < 0 {
            return Err(StoreError::InvalidInput("adjustment exceeds stock on hand"));
        }

        tx.execute(
            "UPDATE stocks SET quantity=?2, revision=?3, updated_at_ms=?4 WHERE id=?1",
            params![id, after, current.revision + 1, now],
        )?;
        let stock = stock_get_conn(&tx, &id)?;
        let movement = insert_movement_tx(
            &tx,
            MovementArgs {
                stock_id: &id,
                delta: request.delta,
                quantity_after: after,
                reason: &reason,
                vaccination_id: None,
                actor_id: request.actor_id.as_deref(),
                now_ms: now,
            },
        )?;
        let mut drafts = Vec::new();
        if crossed_threshold(current.quantity, after, current.alert_threshold) {
            drafts.push(low_stock_draft(&stock));
        }
        let notifications = enqueue_all_tx(&tx, &drafts, now)?;
        tx.commit()?;

        Ok(StockChange {
            stock,
            movement,
            notifications,
        })
    }

    pub fn stock_get(&self, id: &str) -> Result<StockRow, StoreError> {
        let id = normalize_id(RecordKind::Stock, id)?;
        stock_get_conn(&self.conn, &id)
    }

    pub fn stocks_list(&self, request: StocksListRequest) -> Result<Vec<StockRow>, StoreError> {
        let filter = scope_filter(&request.scope, "s", None);
        let mut sql = format!(
            "SELECT {STOCK_COLUMNS} FROM stocks s JOIN vaccines x ON x.id = s.vaccine_id \
             WHERE {}",
            filter.clause
        );
        let mut values = filter.params;
        if let Some(vaccine_id) =
            normalize_optional_id(RecordKind::Vaccine, request.vaccine_id.as_deref())?
        {
            sql.push_str(" AND s.vaccine_id = ?");
            values.push(Value::Text(vaccine_id));
        }
        sql.push_str(
            " ORDER BY s.health_center ASC, x.name ASC, s.expires_at_ms IS NULL, \
             s.expires_at_ms ASC, s.id ASC LIMIT ? OFFSET ?",
        );
        values.push(Value::Integer(to_sqlite_i64(normalize_limit(request.limit))?));
        values.push(Value::Integer(to_sqlite_i64(request.offset)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_stock_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stock_movements(&self, id: &str, limit: usize) -> Result<Vec<StockMovementRow>, StoreError> {
        let id = normalize_id(RecordKind::Stock, id)?;
        let mut stmt = self.conn.prepare(
            "SELECT seq, stock_id, delta, quantity_after, reason, vaccination_id, actor_id, ts_ms \
             FROM stock_movements WHERE stock_id=?1 ORDER BY seq DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![id, to_sqlite_i64(normalize_limit(limit))?], |row| {
            Ok(StockMovementRow {
                seq: row.get(0)?,
                stock_id: row.get(1)?,
                delta: row.get(2)?,
                quantity_after: row.get(3)?,
                reason: row.get(4)?,
                vaccination_id: row.get(5)?,
                actor_id: row.get(6)?,
                ts_ms: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Rows in scope that are empty, expired, at or below threshold, or close to expiry. Most
    /// urgent first.
    pub fn stock_alerts(&self, scope: &Scope, now_ms: i64) -> Result<Vec<StockAlert>, StoreError> {
        let filter = scope_filter(scope, "s", None);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks s JOIN vaccines x ON x.id = s.vaccine_id \
             WHERE {} ORDER BY s.id ASC",
            filter.clause
        ))?;
        let rows = stmt.query_map(params_from_iter(filter.params), read_stock_row)?;
        let warning_ms = self.policy.stock_expiry_warning_ms;

        let mut alerts = Vec::new();
        for row in rows {
            let stock = row?;
            if let Some(kind) = classify_stock(
                stock.quantity,
                stock.alert_threshold,
                stock.expires_at_ms,
                now_ms,
                warning_ms,
            ) {
                alerts.push(StockAlert { stock, kind });
            }
        }
        alerts.sort_by_key(|alert| alert.kind as u8);
        Ok(alerts)
    }
}
