#![forbid(unsafe_code)]

use vt_core::model::NotificationKind;

#[derive(Clone, Debug)]
pub struct NotificationRow {
    pub seq: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub child_id: Option<String>,
    pub vaccination_id: Option<String>,
    pub rooms: Vec<String>,
    pub meta_json: Option<String>,
    pub created_at_ms: i64,
    pub dispatched_at_ms: Option<i64>,
    pub dispatch_attempts: i64,
}

/// An outbox entry before insertion. A second draft with the same key is dropped.
#[derive(Clone, Debug)]
pub struct NotificationDraft {
    pub idempotency_key: String,
    pub kind: NotificationKind,
    pub message: String,
    pub child_id: Option<String>,
    pub vaccination_id: Option<String>,
    pub rooms: Vec<String>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Clone, Debug)]
pub struct NotificationsListRequest {
    /// Rooms the reader listens to; a notification is visible when it targets any of them.
    pub rooms: Vec<String>,
    pub reader: String,
    pub after_seq: i64,
    pub unread_only: bool,
    pub limit: usize,
}

#[derive(Clone, Debug)]
pub struct NotificationView {
    pub notification: NotificationRow,
    pub read: bool,
}

#[derive(Clone, Debug)]
pub struct NotificationsListResult {
    pub items: Vec<NotificationView>,
    pub next_after_seq: i64,
    pub has_more: bool,
}
