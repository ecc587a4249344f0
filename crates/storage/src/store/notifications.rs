#![forbid(unsafe_code)]

use super::support::{
    decode_string_list, encode_meta, encode_string_list, normalize_limit, now_ms, to_sqlite_i64,
};
use super::*;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, Transaction, params, params_from_iter};

const MAX_DISPATCH_ERROR_LEN: usize = 500;
/// Entries that failed this many publishes are no longer offered to the relay.
pub const MAX_DISPATCH_ATTEMPTS: i64 = 5;

const NOTIFICATION_COLUMNS: &str = "n.seq, n.kind, n.title, n.message, n.child_id, \
     n.vaccination_id, n.rooms_json, n.meta_json, n.created_at_ms, n.dispatched_at_ms, \
     n.dispatch_attempts";

fn read_notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    let rooms_json: String = row.get(6)?;
    Ok(NotificationRow {
        seq: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        child_id: row.get(4)?,
        vaccination_id: row.get(5)?,
        rooms: decode_string_list(&rooms_json),
        meta_json: row.get(7)?,
        created_at_ms: row.get(8)?,
        dispatched_at_ms: row.get(9)?,
        dispatch_attempts: row.get(10)?,
    })
}

/// Inserts an outbox entry in the caller's transaction. Returns `None` when an entry with the
/// same idempotency key already exists.
pub(super) fn enqueue_notification_tx(
    tx: &Transaction<'_>,
    draft: &NotificationDraft,
    now_ms: i64,
) -> Result<Option<NotificationRow>, StoreError> {
    let key = draft.idempotency_key.trim();
    if key.is_empty() {
        return Err(StoreError::InvalidInput("idempotency_key must not be empty"));
    }
    if draft.rooms.is_empty() {
        return Err(StoreError::InvalidInput("notification needs at least one room"));
    }
    let mut rooms = draft.rooms.clone();
    rooms.sort();
    rooms.dedup();
    let rooms_json = encode_string_list(&rooms)?;
    let meta_json = encode_meta(draft.meta.as_ref())?;

    let inserted = tx.execute(
        "INSERT OR IGNORE INTO notifications(idempotency_key, kind, title, message, child_id, \
         vaccination_id, rooms_json, meta_json, created_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            key,
            draft.kind.as_str(),
            draft.kind.title(),
            draft.message,
            draft.child_id,
            draft.vaccination_id,
            rooms_json,
            meta_json,
            now_ms,
        ],
    )?;
    if inserted == 0 {
        return Ok(None);
    }

    let seq = tx.last_insert_rowid();
    for room in &rooms {
        tx.execute(
            "INSERT INTO notification_rooms(seq, room) VALUES (?1, ?2)",
            params![seq, room],
        )?;
    }

    Ok(Some(NotificationRow {
        seq,
        kind: draft.kind.as_str().to_string(),
        title: draft.kind.title().to_string(),
        message: draft.message.clone(),
        child_id: draft.child_id.clone(),
        vaccination_id: draft.vaccination_id.clone(),
        rooms,
        meta_json,
        created_at_ms: now_ms,
        dispatched_at_ms: None,
        dispatch_attempts: 0,
    }))
}

/// Enqueues every draft and keeps only the freshly inserted rows.
pub(super) fn enqueue_all_tx(
    tx: &Transaction<'_>,
    drafts: &[NotificationDraft],
    now_ms: i64,
) -> Result<Vec<NotificationRow>, StoreError> {
    let mut out = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if let Some(row) = enqueue_notification_tx(tx, draft, now_ms)? {
            out.push(row);
        }
    }
    Ok(out)
}

impl SqliteStore {
    pub fn notification_enqueue(
        &mut self,
        draft: NotificationDraft,
    ) -> Result<Option<NotificationRow>, StoreError> {
        let tx = self.conn.transaction()?;
        let row = enqueue_notification_tx(&tx, &draft, now_ms())?;
        tx.commit()?;
        Ok(row)
    }

    /// Oldest undispatched entries first, skipping those that exhausted their attempts.
    pub fn notifications_pending(&self, limit: usize) -> Result<Vec<NotificationRow>, StoreError> {
        let limit = to_sqlite_i64(normalize_limit(limit))?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications n \
             WHERE n.dispatched_at_ms IS NULL AND n.dispatch_attempts < ?2 \
             ORDER BY n.seq ASC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit, MAX_DISPATCH_ATTEMPTS], read_notification_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn notification_mark_dispatched(&mut self, seq: i64, now_ms: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE notifications SET dispatched_at_ms=?2, dispatch_attempts=dispatch_attempts+1, \
             last_error=NULL WHERE seq=?1 AND dispatched_at_ms IS NULL",
            params![seq, now_ms],
        )?;
        if changed == 0 {
            let exists = self
                .conn
                .query_row(
                    "SELECT 1 FROM notifications WHERE seq=?1",
                    params![seq],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::UnknownId);
            }
        }
        Ok(())
    }

    /// Records a failed publish. The entry stays pending until it reaches
    /// [`MAX_DISPATCH_ATTEMPTS`].
    pub fn notification_mark_failed(&mut self, seq: i64, error: &str) -> Result<(), StoreError> {
        let error = error.chars().take(MAX_DISPATCH_ERROR_LEN).collect::<String>();
        let changed = self.conn.execute(
            "UPDATE notifications SET dispatch_attempts=dispatch_attempts+1, last_error=?2 \
             WHERE seq=?1",
            params![seq, error],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }
        Ok(())
    }

    pub fn notifications_list(
        &self,
        request: NotificationsListRequest,
    ) -> Result<NotificationsListResult, StoreError> {
        let limit = normalize_limit(request.limit);
        if request.rooms.is_empty() {
            return Ok(NotificationsListResult {
                items: Vec::new(),
                next_after_seq: request.after_seq,
                has_more: false,
            });
        }

        let placeholders = vec!["?"; request.rooms.len()].join(", ");
        let unread_clause = if request.unread_only {
            " AND r.seq IS NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS}, r.seq IS NOT NULL FROM notifications n \
             LEFT JOIN notification_reads r ON r.seq = n.seq AND r.reader = ? \
             WHERE n.seq > ? \
               AND EXISTS (SELECT 1 FROM notification_rooms nr \
                           WHERE nr.seq = n.seq AND nr.room IN ({placeholders})){unread_clause} \
             ORDER BY n.seq ASC LIMIT ?"
        );

        let mut values = Vec::with_capacity(request.rooms.len() + 3);
        values.push(Value::Text(request.reader.clone()));
        values.push(Value::Integer(request.after_seq));
        values.extend(request.rooms.iter().cloned().map(Value::Text));
        values.push(Value::Integer(to_sqlite_i64(limit + 1)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(NotificationView {
                notification: read_notification_row(row)?,
                read: row.get(11)?,
            })
        })?;
        let mut items = rows.collect::<Result<Vec<_>, _>>()?;
        let has_more = items.len() > limit;
        items.truncate(limit);
        let next_after_seq = items
            .last()
            .map(|view| view.notification.seq)
            .unwrap_or(request.after_seq);

        Ok(NotificationsListResult {
            items,
            next_after_seq,
            has_more,
        })
    }

    /// Marks a notification read for `reader`. Notifications outside `rooms` are unknown to
    /// the reader.
    pub fn notification_mark_read(
        &mut self,
        seq: i64,
        reader: &str,
        rooms: &[String],
    ) -> Result<(), StoreError> {
        if rooms.is_empty() {
            return Err(StoreError::UnknownId);
        }
        let tx = self.conn.transaction()?;
        let placeholders = vec!["?"; rooms.len()].join(", ");
        let mut values = vec![Value::Integer(seq)];
        values.extend(rooms.iter().cloned().map(Value::Text));
        let visible = tx
            .query_row(
                &format!(
                    "SELECT 1 FROM notification_rooms WHERE seq = ? AND room IN ({placeholders}) \
                     LIMIT 1"
                ),
                params_from_iter(values),
                |_| Ok(()),
            )
            .optional()?;
        if visible.is_none() {
            return Err(StoreError::UnknownId);
        }
        tx.execute(
            "INSERT OR IGNORE INTO notification_reads(seq, reader, read_at_ms) VALUES (?1, ?2, ?3)",
            params![seq, reader, now_ms()],
        )?;
        tx.commit()?;
        Ok(())
    }
}
